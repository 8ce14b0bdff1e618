//! 请求体规范化
//!
//! 将调用方的 OpenAI 请求整形为上游可接受的形态：
//! - 不支持 system 角色的模型，system 消息改为 user
//! - image_url 内容块内联为 base64 图片
//! - 可选的对话轮次修复

use super::image::{resolve_image, ImageFetcher};
use crate::models::{
    ChatMessage, ChatRequest, ContentBlock, ImageSource, MessageContent, Role, TypedBlock,
};
use serde::{Deserialize, Serialize};

/// 规范化策略
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerPolicy {
    /// 不支持 system 角色的模型前缀
    pub system_role_unsupported_prefixes: Vec<String>,
    /// 是否内联 image_url 内容块
    pub inline_images: bool,
    /// 开头连续两条 user 消息时插入 assistant 占位
    pub repair_turn_order: bool,
}

impl Default for NormalizerPolicy {
    fn default() -> Self {
        Self {
            system_role_unsupported_prefixes: vec!["claude-".to_string(), "gemini-".to_string()],
            inline_images: true,
            repair_turn_order: false,
        }
    }
}

impl NormalizerPolicy {
    fn coerces_system_role(&self, model: &str) -> bool {
        self.system_role_unsupported_prefixes
            .iter()
            .any(|prefix| model.starts_with(prefix.as_str()))
    }
}

/// 规范化请求
///
/// 不会失败：无法处理的内容块原样保留。
pub async fn normalize(
    mut request: ChatRequest,
    policy: &NormalizerPolicy,
    fetcher: &dyn ImageFetcher,
) -> ChatRequest {
    if request.messages.is_empty() {
        return request;
    }

    if policy.coerces_system_role(&request.model) {
        coerce_system_role(&mut request.messages);
    }

    if policy.inline_images {
        for message in request.messages.iter_mut() {
            inline_message_images(message, fetcher).await;
        }
    }

    if policy.repair_turn_order {
        repair_turn_order(&mut request.messages);
    }

    request
}

/// system 消息改为 user，顺序与内容不变
pub fn coerce_system_role(messages: &mut [ChatMessage]) {
    for message in messages.iter_mut().filter(|m| m.role == Role::System) {
        message.role = Role::User;
    }
}

/// 前两条消息都是 user 时，在第一条之后插入 `assistant("ok")`
pub fn repair_turn_order(messages: &mut Vec<ChatMessage>) {
    if messages.len() >= 2 && messages[0].role == Role::User && messages[1].role == Role::User {
        messages.insert(1, ChatMessage::text(Role::Assistant, "ok"));
    }
}

async fn inline_message_images(message: &mut ChatMessage, fetcher: &dyn ImageFetcher) {
    let Some(MessageContent::Blocks(blocks)) = message.content.as_mut() else {
        return;
    };

    for block in blocks.iter_mut() {
        let ContentBlock::Typed(TypedBlock::ImageUrl { image_url, extra }) = block else {
            continue;
        };

        if let Some(image) = resolve_image(fetcher, &image_url.url).await {
            *block = ContentBlock::Typed(TypedBlock::Image {
                source: ImageSource::base64(image.media_type, image.data),
                extra: std::mem::take(extra),
            });
        }
    }
}
