/*!
 * Translator and Aligner Components
 *
 * Thin skeletons over the translation and alignment service interfaces.
 * Translated text is parked in the translator's pool; alignment walks the
 * attention matrix a translation backend would supply.
 */

use super::renderer::Renderer;
use crate::core::errors::{EngineError, EngineResult};
use crate::core::types::{Address, Language};
use crate::memory::{PoolAllocator, PoolRef};
use parking_lot::Mutex;
use std::sync::Arc;

/// Token-to-token attention weights for one translation
#[derive(Debug, Clone, PartialEq)]
pub struct AttentionMatrix {
    pub rows: usize,
    pub cols: usize,
    pub weights: Vec<f32>,
}

impl AttentionMatrix {
    pub fn new(rows: usize, cols: usize, weights: Vec<f32>) -> EngineResult<Self> {
        if weights.len() != rows * cols {
            return Err(EngineError::InvalidInput(format!(
                "attention matrix is {}x{} but carries {} weights",
                rows,
                cols,
                weights.len()
            )));
        }
        Ok(Self {
            rows,
            cols,
            weights,
        })
    }

    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.weights[row * self.cols + col]
    }
}

/// One finished translation; the text lives in the translator's pool
#[derive(Debug, Clone)]
pub struct TranslationResult {
    pub text_address: Address,
    pub text_length: usize,
    pub attention: AttentionMatrix,
}

/// Translation backend interface
pub trait TranslationService: Send + Sync {
    fn translate(&self, text: &str, source: Language, target: Language) -> EngineResult<String>;

    fn attention_matrix(&self, source: &str, target: &str) -> EngineResult<AttentionMatrix>;
}

/// Alignment backend interface: pairs of (source token, target token)
pub trait AlignmentService: Send + Sync {
    fn align_tokens(
        &self,
        source_tokens: &[String],
        target_tokens: &[String],
        attention: &AttentionMatrix,
    ) -> EngineResult<Vec<(usize, usize)>>;
}

/// Translates text through a backend and parks the result in pool memory
pub struct Translator {
    allocator: Arc<PoolAllocator>,
    pool: PoolRef,
    service: Arc<dyn TranslationService>,
    inner: Mutex<()>,
}

impl Translator {
    pub fn new(
        allocator: Arc<PoolAllocator>,
        pool_size: usize,
        service: Arc<dyn TranslationService>,
    ) -> EngineResult<Self> {
        let pool = allocator.create(pool_size)?;
        Ok(Self {
            allocator,
            pool,
            service,
            inner: Mutex::new(()),
        })
    }

    pub fn pool(&self) -> &PoolRef {
        &self.pool
    }

    /// Translate `text` and keep the result in this translator's pool.
    pub fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> EngineResult<TranslationResult> {
        if text.is_empty() {
            return Err(EngineError::InvalidInput("empty text".to_string()));
        }
        let _guard = self.inner.lock();

        let translated = self.service.translate(text, source, target)?;
        let attention = self.service.attention_matrix(text, &translated)?;

        let text_address = self
            .allocator
            .alloc_from(&self.pool, translated.len().max(1))?;
        self.allocator
            .write_bytes(text_address, translated.as_bytes())?;

        Ok(TranslationResult {
            text_address,
            text_length: translated.len(),
            attention,
        })
    }

    /// Text of a result previously produced by this translator.
    pub fn result_text(&self, result: &TranslationResult) -> EngineResult<String> {
        let bytes = self
            .allocator
            .read_bytes(result.text_address, result.text_length)?;
        String::from_utf8(bytes).map_err(|err| EngineError::Encoding(err.to_string()))
    }

    /// Release a result's pool allocation.
    pub fn free_result(&self, result: TranslationResult) -> EngineResult<()> {
        self.allocator.free_to(&self.pool, result.text_address)?;
        Ok(())
    }
}

impl Drop for Translator {
    fn drop(&mut self) {
        if self.allocator.destroy(&self.pool).is_err() {
            log::warn!("translator pool was already gone at drop");
        }
    }
}

/// Aligns source and target tokens using an attention matrix
pub struct Aligner {
    service: Arc<dyn AlignmentService>,
    renderer: Arc<Renderer>,
    inner: Mutex<()>,
}

impl Aligner {
    pub fn new(service: Arc<dyn AlignmentService>, renderer: Arc<Renderer>) -> Self {
        Self {
            service,
            renderer,
            inner: Mutex::new(()),
        }
    }

    /// Tokenize both sides and ask the backend for aligned index pairs,
    /// returned as (source word, target word) text pairs.
    pub fn align(
        &self,
        source_text: &str,
        target_text: &str,
        source_lang: Language,
        target_lang: Language,
        attention: &AttentionMatrix,
    ) -> EngineResult<Vec<(String, String)>> {
        let _guard = self.inner.lock();

        let source = self.renderer.tokenize(source_text, source_lang)?;
        let target = self.renderer.tokenize(target_text, target_lang)?;

        let source_words = source
            .tokens
            .iter()
            .map(|token| self.renderer.token_text(token))
            .collect::<EngineResult<Vec<_>>>()?;
        let target_words = target
            .tokens
            .iter()
            .map(|token| self.renderer.token_text(token))
            .collect::<EngineResult<Vec<_>>>()?;

        let pairs = self
            .service
            .align_tokens(&source_words, &target_words, attention)?;

        let mut aligned = Vec::with_capacity(pairs.len());
        for (src, dst) in pairs {
            let src_word = source_words
                .get(src)
                .ok_or_else(|| EngineError::Service(format!("source index {} out of range", src)))?;
            let dst_word = target_words
                .get(dst)
                .ok_or_else(|| EngineError::Service(format!("target index {} out of range", dst)))?;
            aligned.push((src_word.clone(), dst_word.clone()));
        }

        self.renderer.free_result(source)?;
        self.renderer.free_result(target)?;
        Ok(aligned)
    }
}

/// Translate-then-align pipeline
pub struct TranslatorAligner {
    translator: Translator,
    aligner: Aligner,
}

impl TranslatorAligner {
    pub fn new(translator: Translator, aligner: Aligner) -> Self {
        Self {
            translator,
            aligner,
        }
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    /// Translate `text` and align its tokens with the translation.
    pub fn process(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> EngineResult<Vec<(String, String)>> {
        let result = self.translator.translate(text, source, target)?;
        let translated = self.translator.result_text(&result)?;
        let aligned = self
            .aligner
            .align(text, &translated, source, target, &result.attention)?;
        self.translator.free_result(result)?;
        Ok(aligned)
    }
}
