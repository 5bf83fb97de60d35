/*!
 * Components Module
 *
 * Skeletons of the higher-level engine components. Their service
 * dependencies are trait objects with no shipped implementation; the
 * component bodies validate inputs, serialize access, call the service, and
 * park results in pool memory through the allocator.
 */

pub mod renderer;
pub mod translator;

// Re-export for convenience
pub use renderer::{
    ClassificationService, ClassifiedToken, LinguisticElement, Renderer, RendererResult, Token,
    TokenClass, TokenizationService,
};
pub use translator::{
    Aligner, AlignmentService, AttentionMatrix, TranslationResult, TranslationService, Translator,
    TranslatorAligner,
};
