//! Keyword-based template suggestions for a topic.

use serde::Serialize;

use crate::store::TemplateStore;

const RELIGIOUS_KEYWORDS: &[&str] = &[
    "bíblico", "religioso", "profecia", "apocalipse", "deus", "jesus", "bíblia",
];
const RELIGIOUS_NAMES: &[&str] = &["religioso", "cinematográfico"];
const RELIGIOUS_SCORE: u32 = 3;

const CURIOSITY_KEYWORDS: &[&str] = &[
    "curioso", "interessante", "fato", "descoberta", "ciência", "história",
];
const CURIOSITY_NAMES: &[&str] = &["curioso", "fatos"];
const CURIOSITY_SCORE: u32 = 2;

/// A template ranked for a topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateSuggestion {
    pub template_id: String,
    pub name: String,
    pub description: String,
    pub score: u32,
    pub reasons: Vec<String>,
    pub assets_ready: bool,
}

/// Score a template name against a topic.
pub fn score_topic(topic: &str, template_name: &str) -> (u32, Vec<String>) {
    let topic = topic.to_lowercase();
    let name = template_name.to_lowercase();
    let mentions = |text: &str, words: &[&str]| words.iter().any(|w| text.contains(w));

    let mut score = 0;
    let mut reasons = Vec::new();

    if mentions(&topic, RELIGIOUS_KEYWORDS) && mentions(&name, RELIGIOUS_NAMES) {
        score += RELIGIOUS_SCORE;
        reasons.push("religious content detected".to_string());
    }
    if mentions(&topic, CURIOSITY_KEYWORDS) && mentions(&name, CURIOSITY_NAMES) {
        score += CURIOSITY_SCORE;
        reasons.push("educational content detected".to_string());
    }

    (score, reasons)
}

/// Templates matching `topic`, best first. Templates scoring zero are
/// left out.
pub fn suggest_templates(store: &TemplateStore, topic: &str) -> Vec<TemplateSuggestion> {
    let mut suggestions: Vec<TemplateSuggestion> = store
        .list()
        .into_iter()
        .filter_map(|summary| {
            let (score, reasons) = score_topic(topic, &summary.name);
            (score > 0).then(|| TemplateSuggestion {
                assets_ready: store.assets_ready(&summary.id).unwrap_or(false),
                template_id: summary.id,
                name: summary.name,
                description: summary.description,
                score,
                reasons,
            })
        })
        .collect();

    // Stable, so equal scores keep id order.
    suggestions.sort_by(|a, b| b.score.cmp(&a.score));
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgen_models::Template;

    fn store() -> TemplateStore {
        let mut store = TemplateStore::new();
        store.insert(Template::new("cinematic_religious", "Cinematográfico Religioso"));
        store.insert(Template::new("curiosidades", "Fatos Curiosos"));
        store.insert(Template::new("plain", "Simples"));
        store
    }

    #[test]
    fn test_score_religious_topic() {
        let (score, reasons) =
            score_topic("A profecia do Apocalipse", "Cinematográfico Religioso");
        assert_eq!(score, 3);
        assert_eq!(reasons.len(), 1);

        let (score, _) = score_topic("A profecia do Apocalipse", "Fatos Curiosos");
        assert_eq!(score, 0);
    }

    #[test]
    fn test_both_categories_add_up() {
        let (score, reasons) = score_topic("A história de Jesus", "Fatos religiosos");
        assert_eq!(score, 5);
        assert_eq!(reasons.len(), 2);
    }

    #[test]
    fn test_suggestions_sorted_and_filtered() {
        let suggestions = suggest_templates(&store(), "Descoberta científica sobre Deus");
        let ids: Vec<&str> = suggestions.iter().map(|s| s.template_id.as_str()).collect();
        assert_eq!(ids, vec!["cinematic_religious", "curiosidades"]);
        assert_eq!(suggestions[0].score, 3);
        assert_eq!(suggestions[1].score, 2);
        assert!(!suggestions[0].assets_ready);
    }

    #[test]
    fn test_no_match_is_empty() {
        assert!(suggest_templates(&store(), "receitas de bolo").is_empty());
    }
}
