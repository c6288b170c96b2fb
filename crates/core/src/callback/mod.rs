//! Caller-supplied collaborators: interactive prompts and the progress/
//! result sink. The engine never talks to a user or a UI directly; it is
//! handed these at call time and suspends on them.

/// A single-line text prompt. `validate` returns an error message for bad
/// input; implementations re-prompt until it returns `None`.
pub struct TextPrompt {
    pub title: String,
    pub hint: String,
    pub default: String,
    pub validate: fn(&str) -> Option<&'static str>,
}

impl TextPrompt {
    pub fn required(title: impl Into<String>, validate: fn(&str) -> Option<&'static str>) -> Self {
        TextPrompt {
            title: title.into(),
            hint: String::new(),
            default: String::new(),
            validate,
        }
    }
}

/// A single-choice prompt; implementations return the selected option's
/// label (callers parse the `"<index>:<label>"` shape back out).
pub struct ChoicePrompt {
    pub title: String,
    pub body: String,
    pub options: Vec<String>,
}

/// Interactive prompts. Blocking: the flow suspends until the caller
/// answers. `None` means the caller abandoned the flow; there is no
/// timeout on the engine side.
pub trait Prompter {
    fn text(&self, prompt: &TextPrompt) -> Option<String>;
    fn choose(&self, prompt: &ChoicePrompt) -> Option<String>;
}

/// Fire-and-forget progress and error notifications. Must never block.
pub trait ProgressSink {
    fn report(&self, message: &str);
    fn fail(&self, message: &str);
    /// A renderable image URL (the login CAPTCHA). Optional to handle.
    fn image(&self, _url: &str) {}
}

/// Sink that drops everything. Handy for tests and headless callers.
pub struct SilentSink;

impl ProgressSink for SilentSink {
    fn report(&self, _message: &str) {}
    fn fail(&self, _message: &str) {}
}
