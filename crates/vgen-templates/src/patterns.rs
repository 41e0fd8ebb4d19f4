//! Procedural fallback scripts.
//!
//! When no script generator is available a template may still carry a
//! pattern bank: a few interchangeable lines per narrative beat. A script is
//! one line from each beat joined by fixed connective sentences.

use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashMap;

/// Interchangeable lines for each narrative beat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternBank {
    pub intro: Vec<String>,
    /// May contain `{topic}`
    pub development: Vec<String>,
    pub climax: Vec<String>,
    pub conclusion: Vec<String>,
}

impl PatternBank {
    fn from_lines(
        intro: &[&str],
        development: &[&str],
        climax: &[&str],
        conclusion: &[&str],
    ) -> Self {
        let owned = |lines: &[&str]| lines.iter().map(|s| s.to_string()).collect();
        Self {
            intro: owned(intro),
            development: owned(development),
            climax: owned(climax),
            conclusion: owned(conclusion),
        }
    }

    fn is_complete(&self) -> bool {
        !(self.intro.is_empty()
            || self.development.is_empty()
            || self.climax.is_empty()
            || self.conclusion.is_empty())
    }
}

/// Writes scripts from pattern banks keyed by template id.
#[derive(Debug, Clone, Default)]
pub struct PatternScriptWriter {
    banks: HashMap<String, PatternBank>,
}

impl PatternScriptWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer preloaded with the built-in banks.
    pub fn with_builtin_banks() -> Self {
        Self::new().with_bank(
            "cinematic_religious",
            PatternBank::from_lines(
                &[
                    "Você não vai acreditar no que já estava previsto a séculos.",
                    "Prepare-se para descobrir uma verdade chocante.",
                    "O que você está prestes a ver vai mudar tudo.",
                ],
                &["Em {topic} está escrito que", "A {topic} revela que", "Segundo a {topic},"],
                &[
                    "Agora pense comigo sobre isso.",
                    "Mas o que isso significa para nós?",
                    "E se eu te disser que",
                ],
                &[
                    "Ou será que já estamos vivendo o início dessa profecia?",
                    "Será que você está preparado para essa verdade?",
                    "O que você vai fazer com essa informação?",
                ],
            ),
        )
    }

    pub fn with_bank(mut self, template_id: impl Into<String>, bank: PatternBank) -> Self {
        self.banks.insert(template_id.into(), bank);
        self
    }

    pub fn has_bank(&self, template_id: &str) -> bool {
        self.banks.get(template_id).is_some_and(PatternBank::is_complete)
    }

    /// Write a script for `topic`. `None` when the template has no complete
    /// bank.
    pub fn write<R: Rng + ?Sized>(
        &self,
        template_id: &str,
        topic: &str,
        rng: &mut R,
    ) -> Option<String> {
        let bank = self.banks.get(template_id).filter(|b| b.is_complete())?;

        let intro = bank.intro.choose(rng)?;
        let development = format!(
            "{} grandes mudanças estão por vir.",
            bank.development.choose(rng)?.replace("{topic}", topic)
        );
        let climax = bank.climax.choose(rng)?;
        let conclusion = bank.conclusion.choose(rng)?;

        let parts = [
            intro.as_str(),
            "E agora está acontecendo bem diante dos nossos olhos.",
            development.as_str(),
            "O controle total está sendo implementado.",
            climax.as_str(),
            "O que você pensa sobre isso?",
            conclusion.as_str(),
        ];
        Some(parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_same_seed_same_script() {
        let writer = PatternScriptWriter::with_builtin_banks();
        let a = writer.write("cinematic_religious", "Bíblia", &mut StdRng::seed_from_u64(7));
        let b = writer.write("cinematic_religious", "Bíblia", &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);

        let script = a.unwrap();
        assert!(script.contains("Bíblia"));
        assert!(!script.contains("{topic}"));
        assert!(script.ends_with('?'));
    }

    #[test]
    fn test_unknown_template_has_no_script() {
        let writer = PatternScriptWriter::with_builtin_banks();
        assert!(writer.write("curiosidades", "x", &mut StdRng::seed_from_u64(1)).is_none());
        assert!(!writer.has_bank("curiosidades"));
    }

    #[test]
    fn test_incomplete_bank_is_ignored() {
        let bank = PatternBank {
            intro: vec!["Olha só.".into()],
            ..PatternBank::default()
        };
        let writer = PatternScriptWriter::new().with_bank("partial", bank);
        assert!(!writer.has_bank("partial"));
        assert!(writer.write("partial", "x", &mut StdRng::seed_from_u64(1)).is_none());
    }

    #[test]
    fn test_single_line_banks_are_deterministic() {
        let bank = PatternBank::from_lines(&["A."], &["Sobre {topic},"], &["C."], &["D?"]);
        let writer = PatternScriptWriter::new().with_bank("t", bank);
        let script = writer.write("t", "gatos", &mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(
            script,
            "A. E agora está acontecendo bem diante dos nossos olhos. Sobre gatos, grandes \
             mudanças estão por vir. O controle total está sendo implementado. C. O que você \
             pensa sobre isso? D?"
        );
    }
}
