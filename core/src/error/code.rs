/// Stable error codes shared by the CLI exit status and the JSONL reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    GeneralError = 1,
    ParseError = 2,
    ValidationError = 3,
    TaskNotFound = 10,
    DependencyError = 11,
    CircularDependency = 12,
    MarkupError = 13,
    BindingError = 20,
    MissingDependency = 21,
    FileNotFound = 60,
    FileAccessDenied = 61,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}
