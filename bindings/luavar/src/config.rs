//! Interpreter construction options.

/// Options applied when a [`Root`](crate::Root) creates its interpreter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootConfig {
    /// Open the standard libraries (`string`, `table`, `math`, `io`, ...).
    pub open_std_libs: bool,
    /// Chunk name reported in tracebacks for source passed to `do_chunk`.
    ///
    /// Lua's conventions apply: a leading `=` shows the name verbatim,
    /// a leading `@` treats it as a file name.
    pub chunk_name: String,
}

impl Default for RootConfig {
    fn default() -> Self {
        RootConfig {
            open_std_libs: true,
            chunk_name: String::from("=luavar"),
        }
    }
}

impl RootConfig {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_std_libs(mut self, open: bool) -> Self {
        self.open_std_libs = open;
        self
    }

    #[must_use]
    pub fn with_chunk_name(mut self, name: impl Into<String>) -> Self {
        self.chunk_name = name.into();
        self
    }
}
