pub const PO_SESSION_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PO_SESSION_BUILD_N: &str = env!("PO_SESSION_BUILD_N");

pub fn version_cli_text() -> String {
    format!(
        "po-session {}\nBuild {}\nProduct operator derivation shell",
        PO_SESSION_VERSION, PO_SESSION_BUILD_N
    )
}
