//! 机器标识
//!
//! 机器 ID 在进程内首次使用时生成一次，此后保持不变。

use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};

#[derive(Debug, Default)]
pub struct MachineIdentity {
    machine_id: OnceCell<String>,
}

impl MachineIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// 随机 UUID 的 sha256 十六进制摘要
    pub fn machine_id(&self) -> &str {
        self.machine_id.get_or_init(|| {
            let seed = uuid::Uuid::new_v4().to_string();
            format!("{:x}", Sha256::digest(seed.as_bytes()))
        })
    }

    /// 会话 ID：UUID 后接毫秒时间戳，每次调用生成新值
    pub fn session_id(&self) -> String {
        format!(
            "{}{}",
            uuid::Uuid::new_v4(),
            chrono::Utc::now().timestamp_millis()
        )
    }

    pub fn request_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
