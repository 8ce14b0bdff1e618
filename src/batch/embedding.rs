//! Embeddings 批量结果组装与 base64 编码
//!
//! 向量编码方式：每个分量按 IEEE-754 单精度小端序写出，再做标准 base64 编码。

use super::fanout::FanOutResult;
use crate::models::UpstreamEmbeddings;
use crate::processor::GatewayError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// 编码一个向量
pub fn encode_embedding(vector: &[f32]) -> String {
    let bytes: Vec<u8> = vector.iter().flat_map(|v| v.to_le_bytes()).collect();
    STANDARD.encode(bytes)
}

/// 解码一个 base64 向量，末尾不足 4 字节的部分被忽略
pub fn decode_embedding(encoded: &str) -> Result<Vec<f32>, base64::DecodeError> {
    let bytes = STANDARD.decode(encoded)?;
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// 将结果中的浮点向量替换为 base64 字符串
///
/// 已经不是数字数组的 `embedding` 保持不变。
pub fn encode_embeddings_in_place(embeddings: &mut UpstreamEmbeddings) {
    let Some(items) = embeddings.data.as_mut() else {
        return;
    };

    for item in items.iter_mut() {
        let Some(embedding) = item.get_mut("embedding") else {
            continue;
        };
        let Some(vector) = as_f32_vector(embedding) else {
            continue;
        };
        *embedding = Value::String(encode_embedding(&vector));
    }
}

fn as_f32_vector(value: &Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

/// Embeddings 列表响应
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingList {
    pub object: Value,
    pub model: Value,
    pub data: Vec<Value>,
    pub usage: Value,
}

impl EmbeddingList {
    /// 没有任何输入时的空列表
    pub fn empty(requested_model: &str) -> Self {
        Self {
            object: json!("list"),
            model: json!(requested_model),
            data: Vec::new(),
            usage: json!({"prompt_tokens": 0, "total_tokens": 0}),
        }
    }
}

/// 按输入顺序组装扇出结果
///
/// `data[i]` 取第 i 个子请求结果的第一项，并把 `index` 改写为 i；
/// 失败的子请求对应空对象。`object`、`model`、`usage` 取自最先成功完成的子请求。
/// 全部失败时返回第一个错误；空批量返回空列表。
pub fn assemble(
    result: FanOutResult<UpstreamEmbeddings, GatewayError>,
    requested_model: &str,
) -> Result<EmbeddingList, GatewayError> {
    if result.items.is_empty() {
        return Ok(EmbeddingList::empty(requested_model));
    }

    let Some(first) = result.first_success() else {
        return Err(result.first_error().cloned().unwrap_or_else(|| {
            GatewayError::Transport("所有 embeddings 子请求均失败".to_string())
        }));
    };

    let object = first.object.clone().unwrap_or_else(|| json!("list"));
    let model = first
        .model
        .clone()
        .unwrap_or_else(|| json!(requested_model));
    let usage = first.usage.clone().unwrap_or_else(|| json!({}));

    let data = result
        .items
        .iter()
        .map(|item| {
            item.ok()
                .and_then(|embeddings| embeddings.data.as_ref())
                .and_then(|data| data.first())
                .map(|entry| with_index(entry, item.index))
                .unwrap_or_else(|| Value::Object(Map::new()))
        })
        .collect();

    Ok(EmbeddingList {
        object,
        model,
        data,
        usage,
    })
}

fn with_index(entry: &Value, index: usize) -> Value {
    let mut entry = entry.clone();
    if let Some(obj) = entry.as_object_mut() {
        obj.insert("index".to_string(), json!(index));
    }
    entry
}
