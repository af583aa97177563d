use ragchat_core::RagError;
use ragchat_models::ProviderResponse;
use serde_json::Value;

/// Map a non-success status to the error the retrieval layer expects:
/// 429 is a rate limit, anything else an embedding failure.
pub(crate) fn check_status(provider: &str, response: &ProviderResponse) -> Result<(), RagError> {
    match response.status {
        200 => Ok(()),
        429 => Err(RagError::RateLimit(format!("{provider}: {}", response.body))),
        status => Err(RagError::Embedding(format!(
            "{provider} API error ({status}): {}",
            response.body
        ))),
    }
}

/// A JSON number array as a vector. Non-numeric entries are rejected.
pub(crate) fn to_vector(value: &Value) -> Result<Vec<f32>, RagError> {
    let items = value
        .as_array()
        .ok_or_else(|| RagError::Embedding("embedding is not an array".to_string()))?;
    items
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|x| x as f32)
                .ok_or_else(|| RagError::Embedding(format!("non-numeric embedding value: {v}")))
        })
        .collect()
}

/// One vector per input, or an error naming the shortfall.
pub(crate) fn expect_count(vectors: &[Vec<f32>], expected: usize) -> Result<(), RagError> {
    if vectors.len() != expected {
        return Err(RagError::Embedding(format!(
            "expected {expected} embeddings, got {}",
            vectors.len()
        )));
    }
    Ok(())
}
