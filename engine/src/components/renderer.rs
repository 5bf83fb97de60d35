/*!
 * Renderer Component
 *
 * Tokenizes, classifies, and extracts linguistic elements from text. The
 * tokenization and classification backends are service traits; this
 * skeleton copies their output into the renderer's pool and hands back
 * addresses, which is the component's only real engineering substance.
 */

use crate::core::errors::{EngineError, EngineResult};
use crate::core::types::{Address, Language};
use crate::memory::{PoolAllocator, PoolRef};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Grammatical classes a token may belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenClass {
    Noun,
    Verb,
    Adjective,
}

/// One token; its text lives in the renderer's pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub address: Address,
    pub length: usize,
}

/// A token with the classes the classifier assigned to it
#[derive(Debug, Clone)]
pub struct ClassifiedToken {
    pub token: Token,
    pub classes: Vec<TokenClass>,
    pub is_placeholder: bool,
}

/// A linguistic element extracted from classified text
#[derive(Debug, Clone)]
pub enum LinguisticElement {
    Vocab(Token),
    Phrase(Vec<ClassifiedToken>),
    Syntax(Vec<ClassifiedToken>),
}

/// Everything one rendering pass produced
#[derive(Debug, Clone, Default)]
pub struct RendererResult {
    pub tokens: Vec<Token>,
    pub classified_tokens: Vec<ClassifiedToken>,
    pub elements: Vec<LinguisticElement>,
}

/// Splits text into token strings
pub trait TokenizationService: Send + Sync {
    fn tokenize(&self, text: &str, lang: Language) -> EngineResult<Vec<String>>;
}

/// Assigns grammatical classes to token strings
pub trait ClassificationService: Send + Sync {
    fn classify(&self, tokens: &[String]) -> EngineResult<Vec<Vec<TokenClass>>>;
}

/// Text rendering and analysis
pub struct Renderer {
    allocator: Arc<PoolAllocator>,
    pool: PoolRef,
    tokenization: Arc<dyn TokenizationService>,
    classification: Arc<dyn ClassificationService>,
    inner: Mutex<()>,
}

impl Renderer {
    /// Create a renderer with its own pool from the allocator's registry.
    pub fn new(
        allocator: Arc<PoolAllocator>,
        pool_size: usize,
        tokenization: Arc<dyn TokenizationService>,
        classification: Arc<dyn ClassificationService>,
    ) -> EngineResult<Self> {
        let pool = allocator.create(pool_size)?;
        Ok(Self {
            allocator,
            pool,
            tokenization,
            classification,
            inner: Mutex::new(()),
        })
    }

    /// The pool backing this renderer's results.
    pub fn pool(&self) -> &PoolRef {
        &self.pool
    }

    fn park_text(&self, text: &str) -> EngineResult<Token> {
        let address = self.allocator.alloc_from(&self.pool, text.len().max(1))?;
        self.allocator.write_bytes(address, text.as_bytes())?;
        Ok(Token {
            address,
            length: text.len(),
        })
    }

    /// Text of a token previously produced by this renderer.
    pub fn token_text(&self, token: &Token) -> EngineResult<String> {
        let bytes = self.allocator.read_bytes(token.address, token.length)?;
        String::from_utf8(bytes).map_err(|err| EngineError::Encoding(err.to_string()))
    }

    /// Tokenize `text`, parking every token's bytes in the pool.
    pub fn tokenize(&self, text: &str, lang: Language) -> EngineResult<RendererResult> {
        if text.is_empty() {
            return Err(EngineError::InvalidInput("empty text".to_string()));
        }
        let _guard = self.inner.lock();

        let words = self.tokenization.tokenize(text, lang)?;
        let mut tokens = Vec::with_capacity(words.len());
        for word in &words {
            tokens.push(self.park_text(word)?);
        }

        Ok(RendererResult {
            tokens,
            ..Default::default()
        })
    }

    /// Classify a tokenized result in place.
    pub fn classify(&self, result: &mut RendererResult) -> EngineResult<()> {
        let _guard = self.inner.lock();

        let words = result
            .tokens
            .iter()
            .map(|token| self.token_text(token))
            .collect::<EngineResult<Vec<_>>>()?;
        let classes = self.classification.classify(&words)?;
        if classes.len() != result.tokens.len() {
            return Err(EngineError::Service(format!(
                "classifier returned {} entries for {} tokens",
                classes.len(),
                result.tokens.len()
            )));
        }

        result.classified_tokens = result
            .tokens
            .iter()
            .zip(classes)
            .map(|(token, classes)| ClassifiedToken {
                token: *token,
                is_placeholder: classes.is_empty(),
                classes,
            })
            .collect();
        Ok(())
    }

    /// Extract linguistic elements from a classified result in place.
    ///
    /// Each classified token becomes a vocab element; phrase and syntax
    /// extraction wait on a real classification backend.
    pub fn extract_elements(&self, result: &mut RendererResult) -> EngineResult<()> {
        let _guard = self.inner.lock();

        result.elements = result
            .classified_tokens
            .iter()
            .filter(|classified| !classified.is_placeholder)
            .map(|classified| LinguisticElement::Vocab(classified.token))
            .collect();
        Ok(())
    }

    /// Full pass: tokenize, classify, extract.
    pub fn render(&self, text: &str, lang: Language) -> EngineResult<RendererResult> {
        let mut result = self.tokenize(text, lang)?;
        self.classify(&mut result)?;
        self.extract_elements(&mut result)?;
        Ok(result)
    }

    /// Release every pool allocation a result holds.
    pub fn free_result(&self, result: RendererResult) -> EngineResult<()> {
        let _guard = self.inner.lock();
        for token in &result.tokens {
            self.allocator.free_to(&self.pool, token.address)?;
        }
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if self.allocator.destroy(&self.pool).is_err() {
            log::warn!("renderer pool was already gone at drop");
        }
    }
}
