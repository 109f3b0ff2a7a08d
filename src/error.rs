#[derive(Debug, thiserror::Error)]
pub enum PsfError {
    #[error("invalid simulation configuration")]
    Config(#[from] crate::ConfigError),
    #[error("PSF rendering failed")]
    Render(#[from] crate::RenderError),
    #[error("degenerate PSF image moments")]
    Moments(#[from] crate::MomentsError),
    #[error("cannot write simulation outputs")]
    Sink(#[from] crate::SinkError),
}
