use po_session::config::SessionConfig;
use po_session::session::{ActionOutcome, Session};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    Pulse { spin: usize, phase: usize, flip: usize },
    Shift { spin: usize, angle: usize },
    Couple { angle: usize },
    Rejected,
    Undo,
    Clear,
}

const SPINS: [&str; 2] = ["I", "S"];
const PHASES: [&str; 5] = ["x", "y", "-x", "-y", "f"];
const FLIPS: [&str; 5] = ["pi/4", "pi/2", "pi*3/4", "pi", "b"];
const SHIFTS: [&str; 4] = ["pi/2", "pi", "q", "oI*t"];
const COUPLINGS: [&str; 4] = ["pi/8", "pi/4", "pi*JIS*t", "pi"];

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (0usize..2, 0usize..5, 0usize..5)
            .prop_map(|(spin, phase, flip)| Step::Pulse { spin, phase, flip }),
        3 => (0usize..2, 0usize..4).prop_map(|(spin, angle)| Step::Shift { spin, angle }),
        2 => (0usize..4).prop_map(|angle| Step::Couple { angle }),
        1 => Just(Step::Rejected),
        2 => Just(Step::Undo),
        1 => Just(Step::Clear),
    ]
}

fn run(session: &mut Session, step: &Step) {
    match step {
        Step::Pulse { spin, phase, flip } => {
            session
                .apply_pulse(SPINS[*spin], PHASES[*phase], FLIPS[*flip])
                .unwrap();
        }
        Step::Shift { spin, angle } => {
            session
                .apply_chemical_shift(SPINS[*spin], SHIFTS[*angle])
                .unwrap();
        }
        Step::Couple { angle } => {
            session.apply_j_coupling("IS", COUPLINGS[*angle]).unwrap();
        }
        Step::Rejected => {
            assert!(session.apply_chemical_shift("X", "pi").is_err());
        }
        Step::Undo => {
            session.undo().unwrap();
        }
        Step::Clear => {
            session.clear_all().unwrap();
        }
    }
}

proptest! {
    #[test]
    fn incremental_transcript_matches_rebuilt(steps in prop::collection::vec(step(), 0..24)) {
        let mut session = Session::new(SessionConfig::default()).unwrap();
        for step in &steps {
            run(&mut session, step);
            prop_assert_eq!(session.transcript(), session.rebuilt_transcript().unwrap());
            prop_assert_eq!(session.history_len(), session.operation_log().len() + 1);
        }
    }

    #[test]
    fn every_state_extends_its_predecessor(steps in prop::collection::vec(step(), 0..24)) {
        let mut session = Session::new(SessionConfig::default()).unwrap();
        for step in &steps {
            run(&mut session, step);
        }
        let logs: Vec<&str> = session.history().logs().collect();
        for pair in logs.windows(2) {
            prop_assert!(pair[1].starts_with(pair[0]));
            prop_assert!(pair[1].len() > pair[0].len());
        }
    }

    #[test]
    fn undoing_everything_returns_to_initial(steps in prop::collection::vec(step(), 0..24)) {
        let mut session = Session::new(SessionConfig::default()).unwrap();
        let initial = session.transcript();
        for step in &steps {
            run(&mut session, step);
        }
        while session.history_len() > 1 {
            let outcome = session.undo().unwrap();
            prop_assert!(matches!(outcome, ActionOutcome::Undone(_)));
        }
        prop_assert_eq!(session.undo().unwrap(), ActionOutcome::NothingToUndo);
        prop_assert_eq!(session.transcript(), initial);
        prop_assert_eq!(session.current().log(), "Iz + Sz");
    }

    #[test]
    fn clear_is_idempotent(steps in prop::collection::vec(step(), 0..16)) {
        let mut session = Session::new(SessionConfig::default()).unwrap();
        let initial = session.transcript();
        for step in &steps {
            run(&mut session, step);
        }
        let expected = session.history_len() - 1;
        prop_assert_eq!(session.clear_all().unwrap(), expected);
        prop_assert_eq!(session.clear_all().unwrap(), 0);
        prop_assert_eq!(session.transcript(), initial);
        prop_assert!(session.operation_log().is_empty());
    }
}
