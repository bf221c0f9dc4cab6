/// BERT `[SEP]`, emitted by the BLIP text decoder at the end of a caption.
pub const SEP_TOKEN_ID: u32 = 102;
/// BLIP `[DEC]`, the decoder start token.
pub const BOS_TOKEN_ID: u32 = 30522;

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub max_new_tokens: usize,
    pub bos_token_id: u32,
    pub eos_token_id: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: 20,
            bos_token_id: BOS_TOKEN_ID,
            eos_token_id: SEP_TOKEN_ID,
        }
    }
}

/// Autoregressive decoding loop.
///
/// `step` receives the tokens not yet seen by the decoder (the whole prompt
/// on the first call, then only the latest token) and returns the next token.
/// The returned ids exclude both the start token and the end token, and are
/// never longer than `max_new_tokens`.
pub fn generate_tokens<F>(config: &GenerationConfig, mut step: F) -> anyhow::Result<Vec<u32>>
where
    F: FnMut(&[u32]) -> anyhow::Result<u32>,
{
    let mut token_ids = vec![config.bos_token_id];

    for index in 0..config.max_new_tokens {
        let context_size = if index > 0 { 1 } else { token_ids.len() };
        let start_pos = token_ids.len().saturating_sub(context_size);
        let token = step(&token_ids[start_pos..])?;
        if token == config.eos_token_id {
            break;
        }
        token_ids.push(token);
    }

    Ok(token_ids.split_off(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_token_cap() {
        let config = GenerationConfig::default();
        let tokens = generate_tokens(&config, |_| Ok(7)).unwrap();

        assert_eq!(tokens.len(), 20);
        assert!(tokens.iter().all(|t| *t == 7));
    }

    #[test]
    fn stops_early_at_eos() {
        let config = GenerationConfig::default();
        let mut next = [2000u32, 2001, SEP_TOKEN_ID, 2002].into_iter();
        let tokens = generate_tokens(&config, |_| Ok(next.next().unwrap())).unwrap();

        assert_eq!(tokens, vec![2000, 2001]);
    }

    #[test]
    fn feeds_prompt_then_latest_token() {
        let config = GenerationConfig {
            max_new_tokens: 3,
            ..Default::default()
        };
        let mut contexts = vec![];
        let mut counter = 10;
        generate_tokens(&config, |ctx| {
            contexts.push(ctx.to_vec());
            counter += 1;
            Ok(counter)
        })
        .unwrap();

        assert_eq!(contexts, vec![vec![BOS_TOKEN_ID], vec![11], vec![12]]);
    }

    #[test]
    fn zero_cap_generates_nothing() {
        let config = GenerationConfig {
            max_new_tokens: 0,
            ..Default::default()
        };
        let tokens = generate_tokens(&config, |_| panic!("decoder must not run")).unwrap();

        assert!(tokens.is_empty());
    }

    #[test]
    fn propagates_step_errors() {
        let config = GenerationConfig::default();
        let result = generate_tokens(&config, |_| anyhow::bail!("device lost"));

        assert!(result.is_err());
    }
}
