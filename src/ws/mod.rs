// 订阅扇出域 / Subscription fan-out domain
pub mod fanout;
pub mod handler;

pub use fanout::FanoutRegistry;
