use serde::{Deserialize, Serialize};

use super::protocol::QuestionData;

/// A single multiple-choice question. `correct_answer` indexes `options`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl Question {
    pub fn new(question: &str, options: &[&str], correct_answer: usize) -> Self {
        Self {
            question: question.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_answer,
            explanation: None,
        }
    }

    pub fn with_explanation(mut self, explanation: &str) -> Self {
        self.explanation = Some(explanation.to_string());
        self
    }

    /// Client-facing payload with the correct answer withheld
    pub fn public_data(&self) -> QuestionData {
        QuestionData {
            question: self.question.clone(),
            options: self.options.clone(),
        }
    }
}

/// The two question sets a session runs through: a short warm-up sample set
/// and the full-length main set. Each is independently zero-indexed.
#[derive(Debug, Clone)]
pub struct QuestionCatalog {
    pub sample: Vec<Question>,
    pub main: Vec<Question>,
}

impl QuestionCatalog {
    /// The question set active for the given quiz flag
    pub fn set_for(&self, is_main_quiz: bool) -> &[Question] {
        if is_main_quiz {
            &self.main
        } else {
            &self.sample
        }
    }
}

impl Default for QuestionCatalog {
    fn default() -> Self {
        Self {
            sample: vec![
                Question::new(
                    "Which is the largest ocean on Earth?",
                    &["Atlantic", "Indian", "Pacific", "Arctic"],
                    2,
                ),
                Question::new(
                    "Which planet has the most moons in the solar system?",
                    &["Earth", "Mars", "Jupiter", "Saturn"],
                    3,
                ),
                Question::new(
                    "What is the tallest mountain above sea level?",
                    &["K2", "Mont Blanc", "Mount Everest", "Denali"],
                    2,
                ),
                Question::new(
                    "Which gas makes up most of Earth's atmosphere?",
                    &["Nitrogen", "Oxygen", "Carbon dioxide", "Argon"],
                    0,
                ),
                Question::new(
                    "Divide 100 by a half, then add 1. What do you get?",
                    &["51", "45", "101", "201"],
                    3,
                ),
            ],
            main: vec![
                Question::new(
                    "Roughly how much edible food does the average person throw away every day?",
                    &[
                        "One sugar cube",
                        "One rice ball",
                        "One slice of bread",
                        "One banana",
                    ],
                    1,
                )
                .with_explanation(
                    "Per-capita food loss works out to roughly one rice ball \
                     (about 113 grams) of still-edible food discarded every day.",
                ),
                Question::new(
                    "How much water is needed to manufacture a single 500 ml plastic bottle, \
                     not counting the water inside it?",
                    &[
                        "About the same, 0.5 litres",
                        "Twice as much, 1 litre",
                        "Six times as much, 3 litres",
                        "Ten times as much, 5 litres",
                    ],
                    2,
                )
                .with_explanation(
                    "Producing one bottle takes about 3 litres of water across raw material \
                     extraction and manufacturing.",
                ),
                Question::new(
                    "Globally, how much more time do women spend on unpaid care work than men?",
                    &[
                        "About the same",
                        "About 1.5 times",
                        "About 3 times",
                        "About 5 times",
                    ],
                    2,
                )
                .with_explanation(
                    "Women spend roughly three times as many hours on unpaid care work as men, \
                     one of the biggest gaps in gender equality.",
                ),
                Question::new(
                    "Which search engine donates around 80% of its profits to tree planting?",
                    &["Greennie", "Forestia", "Ecosia", "Planterra"],
                    2,
                )
                .with_explanation(
                    "Ecosia, founded in Germany, donates about 80% of its ad profits to \
                     reforestation projects worldwide.",
                ),
                Question::new(
                    "About how much water does it take to produce one cotton T-shirt?",
                    &[
                        "One bathtub (about 200 litres)",
                        "Five oil drums (about 1,000 litres)",
                        "What a person drinks in 2.5 years (about 2,700 litres)",
                        "Half a school pool (about 150,000 litres)",
                    ],
                    2,
                )
                .with_explanation(
                    "Growing the cotton and finishing a single T-shirt consumes around \
                     2,700 litres of water.",
                ),
                Question::new(
                    "By 2050, ocean plastic waste is predicted to outweigh what?",
                    &[
                        "All ships at sea",
                        "All fish in the ocean",
                        "All coral reefs",
                        "All beach sand",
                    ],
                    1,
                )
                .with_explanation(
                    "At the current pace, the total weight of plastic in the ocean is projected \
                     to exceed the total weight of fish by 2050.",
                ),
                Question::new(
                    "The Paris Agreement targets warming below 2°C. What is the more ambitious \
                     limit it also pursues?",
                    &["1.5°C", "2.5°C", "3°C", "4°C"],
                    0,
                )
                .with_explanation(
                    "Signatories agreed to pursue efforts to limit warming to 1.5°C above \
                     pre-industrial levels.",
                ),
                Question::new(
                    "Which of these best describes a circular economy?",
                    &[
                        "Maximizing resource extraction",
                        "Promoting mass production and consumption",
                        "Encouraging single-use products",
                        "Extending product lifetimes and cutting waste",
                    ],
                    3,
                )
                .with_explanation(
                    "A circular economy keeps materials in use through reuse and recycling, \
                     extending product lifetimes and minimizing waste.",
                ),
                Question::new(
                    "Why are gig workers a decent-work concern?",
                    &[
                        "Irregular hours disrupt daily life",
                        "Few chances to build specialist skills",
                        "No employment contract means thin social protection when sick or jobless",
                        "Heavy reliance on digital devices",
                    ],
                    2,
                )
                .with_explanation(
                    "Without employment contracts, gig workers often lack health and \
                     unemployment insurance, a core decent-work gap.",
                ),
                Question::new(
                    "Which part of our diet produces the most methane, a potent greenhouse gas?",
                    &[
                        "Exhaust from food transport",
                        "Fertilizer-heavy corn fields",
                        "Cattle burps and flatulence",
                        "Fuel burned in food factories",
                    ],
                    2,
                )
                .with_explanation(
                    "Ruminants like cattle release large amounts of methane during digestion; \
                     methane traps roughly 25 times more heat than CO2.",
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_sizes() {
        let catalog = QuestionCatalog::default();
        assert_eq!(catalog.sample.len(), 5);
        assert_eq!(catalog.main.len(), 10);
    }

    #[test]
    fn test_correct_answers_in_range() {
        let catalog = QuestionCatalog::default();
        for q in catalog.sample.iter().chain(catalog.main.iter()) {
            assert!(q.correct_answer < q.options.len(), "{}", q.question);
        }
    }

    #[test]
    fn test_main_questions_have_explanations() {
        let catalog = QuestionCatalog::default();
        assert!(catalog.main.iter().all(|q| q.explanation.is_some()));
    }

    #[test]
    fn test_public_data_withholds_answer() {
        let q = Question::new("Q?", &["a", "b"], 1);
        let value = serde_json::to_value(q.public_data()).unwrap();
        assert!(value.get("correctAnswer").is_none());
        assert_eq!(value["options"][0], "a");
    }
}
