use thiserror::Error;

/// Why a blocking result helper on [`Producer`](crate::Producer) did not produce a value.
///
/// Stream failures are ordinary data while a stream runs; this type only exists at the edge,
/// where a caller waits for an execution to finish.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaitError<E> {
    /// The producer sent `Failed`.
    #[error("producer failed: {0}")]
    Failed(E),

    /// The execution was interrupted before it completed.
    #[error("producer was interrupted")]
    Interrupted,

    /// The producer completed without sending a value.
    #[error("producer completed without sending a value")]
    Empty,

    /// The producer sent more than one value where exactly one was expected.
    #[error("producer sent more than one value")]
    MultipleValues,
}

impl<E> WaitError<E> {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            WaitError::Failed(_) => "failed",
            WaitError::Interrupted => "interrupted",
            WaitError::Empty => "empty",
            WaitError::MultipleValues => "multiple_values",
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(WaitError::Failed("disk full".to_string()), "failed", "producer failed: disk full")]
    #[case(WaitError::Interrupted, "interrupted", "producer was interrupted")]
    #[case(WaitError::Empty, "empty", "producer completed without sending a value")]
    #[case(WaitError::MultipleValues, "multiple_values", "producer sent more than one value")]
    fn labels_and_messages(#[case] error: WaitError<String>, #[case] label: &str, #[case] message: &str) {
        assert_eq!(error.as_label(), label);
        assert_eq!(error.to_string(), message);
    }
}
