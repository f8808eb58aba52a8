pub mod push;
pub mod time;

pub use self::push::PushSender;
pub use self::time::TimeProvider;
