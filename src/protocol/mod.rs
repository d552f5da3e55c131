pub mod command;
pub mod connection;
pub mod packet;
pub mod primitive;
pub mod temporal;

/// Outcome of one resumable protocol step
///
/// `NeedData` and `NeedFlush` are suspension points, not failures: nothing has been consumed
/// and the same step can be called again once the caller has refilled or flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action<T> {
    /// Read more bytes from the server into the read buffer
    NeedData,
    /// Send the write buffer to the server to make room
    NeedFlush,
    Done(T),
}

impl<T> Action<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Action<U> {
        match self {
            Action::NeedData => Action::NeedData,
            Action::NeedFlush => Action::NeedFlush,
            Action::Done(value) => Action::Done(f(value)),
        }
    }
}
