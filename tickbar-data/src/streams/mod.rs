/// Read-idle timeout wrapper for the feed socket.
pub mod timeout;
