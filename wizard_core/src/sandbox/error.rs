use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to initialize sandbox runtime: {0}")]
    Init(String),

    #[error("compile error: {0}")]
    Compile(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("document finished without mounting any output")]
    NothingMounted,

    #[error("execution host is no longer running")]
    HostGone,
}

impl SandboxError {
    /// Split into a short message and the full diagnostic trace for the
    /// in-host error panel.
    pub fn diagnostic(&self) -> (String, String) {
        let full = self.to_string();
        let message = full.lines().next().unwrap_or_default().to_string();
        (message, full)
    }
}

impl From<mlua::Error> for SandboxError {
    fn from(err: mlua::Error) -> Self {
        match err {
            mlua::Error::SyntaxError { message, .. } => SandboxError::Compile(message),
            other => SandboxError::Runtime(other.to_string()),
        }
    }
}
