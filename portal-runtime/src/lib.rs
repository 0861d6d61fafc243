//! 门户事件子系统装配（portal-runtime）
//!
//! - `config`：`RuntimeConfig` 的 JSON 加载、环境变量覆盖与校验；
//! - `services`：`EventingServices` 容器，持有总线、队列与 Webhook 分发器。
//!
pub mod config;
pub mod error;
pub mod services;

pub use config::{RuntimeConfig, TransportConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use services::EventingServices;
