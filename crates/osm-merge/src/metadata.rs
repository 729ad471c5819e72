/// Name and version of this build
pub fn short_version_info() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

pub fn log_version_info() {
    tracing::info!("{}", short_version_info());
}
