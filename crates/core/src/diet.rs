//! Diet plan generation.
//!
//! Every plan covers the master food taxonomy exactly: the model is asked to classify each item,
//! and its answer is merged back onto the taxonomy by exact (category, item) name match. Items
//! the model skipped, misspelled or gave an unknown status default to `allowed`; anything the
//! model invented is ignored. Plan shape therefore never depends on how complete the model was.

use crate::model::{Generator, ResponseFormat};
use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

const STANDARD_TAXONOMY: &[(&str, &[&str])] = &[
    (
        "Deep Fried food",
        &[
            "Samosa",
            "Dosa",
            "Udid-Wada",
            "Pakodas",
            "Fried Papad",
            "Namkeens",
            "Potato chips",
            "French fries",
            "Puri",
        ],
    ),
    (
        "Sweets",
        &[
            "Sugar",
            "All sweets",
            "Cakes",
            "Jam",
            "Honey",
            "Sweetened Biscuits",
            "Sweetened Drinks",
            "Fruit shakes",
            "Sweet fruits (Mango, Grapes)",
        ],
    ),
    (
        "Green vegetables",
        &[
            "Cauliflower",
            "Cabbage",
            "Lady's finger",
            "Tomato",
            "Brinjal",
            "Radish",
            "Pumpkin",
            "Cucumber",
        ],
    ),
    ("Tubers", &["Potato", "Sweet Potato"]),
    ("Milk", &["Milk with Protein powder", "Complan/Bournvita"]),
    (
        "Liquids",
        &[
            "Water",
            "Lime water",
            "Coconut water",
            "Electral water",
            "Buttermilk",
        ],
    ),
    (
        "Hot drinks",
        &["Tea", "Coffee", "Herbal tea", "Warm milk", "Soups"],
    ),
    ("Cold drinks", &["Aerated drinks", "Ice-cream"]),
    (
        "Soft food (Breakfast)",
        &["Idli", "Sheera", "Bread", "Toast", "Khakra", "Cornflakes"],
    ),
    (
        "Soft food (Meal)",
        &[
            "Ganji (Rice/Sabu)",
            "Payasam",
            "Soft rice with milk/Ghee/Plain Daal",
            "Salads",
            "Boiled vegetables",
        ],
    ),
    ("Regular food (Breakfast)", &["Upma", "Puri-Bhaji"]),
    (
        "Regular food (Meals)",
        &["Chapati", "Phulka", "Roti", "Spicy vegetables"],
    ),
    ("Fast Foods", &["Hamburger", "Pizza"]),
    (
        "Fruits",
        &["Banana", "Apple", "Pear", "Papaya", "Watermelon", "Mango"],
    ),
    ("Sour fruits", &["Citrus fruits (Orange, Lemon, Mosambi)"]),
    ("Dry fruits", &["Dates", "Manuka", "Pista", "Almond"]),
    (
        "Non-veg",
        &[
            "Egg-white",
            "Egg-Yellow",
            "Omlet",
            "Boiled Egg",
            "Meat",
            "Lean meat",
        ],
    ),
    ("Sea food", &["Fish"]),
];

static STANDARD: LazyLock<Arc<MasterFoodTaxonomy>> = LazyLock::new(|| {
    Arc::new(MasterFoodTaxonomy {
        categories: STANDARD_TAXONOMY
            .iter()
            .map(|(name, items)| TaxonomyCategory {
                name: (*name).to_string(),
                items: items.iter().map(|i| (*i).to_string()).collect(),
            })
            .collect(),
    })
});

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DietStatus {
    #[default]
    Allowed,
    Limited,
    Avoid,
}

impl DietStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Limited => "limited",
            Self::Avoid => "avoid",
        }
    }

    /// Parses a model-supplied status, ignoring surrounding whitespace and case.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        [Self::Allowed, Self::Limited, Self::Avoid]
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for DietStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DietItem {
    pub name: String,
    pub status: DietStatus,
    /// Whether the item appears on the printed report.
    pub selected: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DietCategory {
    pub category: String,
    pub items: Vec<DietItem>,
}

/// A generated plan, one entry per taxonomy category in taxonomy order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DietPlan {
    categories: Vec<DietCategory>,
}

impl DietPlan {
    pub fn categories(&self) -> &[DietCategory] {
        &self.categories
    }

    pub fn into_categories(self) -> Vec<DietCategory> {
        self.categories
    }

    /// All (category, item) pairs in plan order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &DietItem)> + '_ {
        self.categories.iter().flat_map(|c| {
            c.items
                .iter()
                .map(move |item| (c.category.as_str(), item))
        })
    }

    fn item_mut(&mut self, category: &str, item: &str) -> Option<&mut DietItem> {
        self.categories
            .iter_mut()
            .find(|c| c.category == category)?
            .items
            .iter_mut()
            .find(|i| i.name == item)
    }

    /// Overrides the status of one item. Returns false if the item is not in the plan.
    pub fn set_status(&mut self, category: &str, item: &str, status: DietStatus) -> bool {
        match self.item_mut(category, item) {
            Some(entry) => {
                entry.status = status;
                true
            }
            None => false,
        }
    }

    /// Flips whether one item is printed. Returns the new value, or `None` if unknown.
    pub fn toggle_selected(&mut self, category: &str, item: &str) -> Option<bool> {
        let entry = self.item_mut(category, item)?;
        entry.selected = !entry.selected;
        Some(entry.selected)
    }

    /// The plan as printed: unselected items removed, then empty categories removed.
    pub fn selected_plan(&self) -> Vec<DietCategory> {
        self.categories
            .iter()
            .map(|c| DietCategory {
                category: c.category.clone(),
                items: c.items.iter().filter(|i| i.selected).cloned().collect(),
            })
            .filter(|c| !c.items.is_empty())
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct TaxonomyCategory {
    name: String,
    items: Vec<String>,
}

/// Fixed category to food-item mapping that every plan must cover.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MasterFoodTaxonomy {
    categories: Vec<TaxonomyCategory>,
}

impl MasterFoodTaxonomy {
    /// Builds a taxonomy, preserving the given order.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidInput` if the taxonomy is empty, a name is blank, a category is
    /// repeated, or an item is repeated within its category.
    pub fn new<C, I>(categories: C) -> CoreResult<Self>
    where
        C: IntoIterator<Item = (String, I)>,
        I: IntoIterator<Item = String>,
    {
        let mut seen_categories = HashSet::new();
        let mut built = Vec::new();

        for (name, items) in categories {
            if name.trim().is_empty() {
                return Err(CoreError::InvalidInput(
                    "taxonomy category name cannot be empty".into(),
                ));
            }
            if !seen_categories.insert(name.clone()) {
                return Err(CoreError::InvalidInput(format!(
                    "duplicate taxonomy category: {name}"
                )));
            }

            let mut seen_items = HashSet::new();
            let mut category_items = Vec::new();
            for item in items {
                if item.trim().is_empty() {
                    return Err(CoreError::InvalidInput(format!(
                        "empty item name in taxonomy category {name}"
                    )));
                }
                if !seen_items.insert(item.clone()) {
                    return Err(CoreError::InvalidInput(format!(
                        "duplicate item {item} in taxonomy category {name}"
                    )));
                }
                category_items.push(item);
            }

            built.push(TaxonomyCategory {
                name,
                items: category_items,
            });
        }

        if built.is_empty() {
            return Err(CoreError::InvalidInput("taxonomy cannot be empty".into()));
        }

        Ok(Self { categories: built })
    }

    /// The built-in taxonomy, constructed once per process.
    pub fn standard() -> Arc<Self> {
        Arc::clone(&STANDARD)
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.categories.iter().map(|c| c.name.as_str())
    }

    pub fn items(&self, category: &str) -> Option<&[String]> {
        self.categories
            .iter()
            .find(|c| c.name == category)
            .map(|c| c.items.as_slice())
    }

    pub fn item_count(&self) -> usize {
        self.categories.iter().map(|c| c.items.len()).sum()
    }

    /// The taxonomy as a JSON object of category to item list, for prompting.
    ///
    /// Categories keep taxonomy order.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.categories
                .iter()
                .map(|c| {
                    (
                        c.name.clone(),
                        Value::Array(c.items.iter().cloned().map(Value::String).collect()),
                    )
                })
                .collect(),
        )
    }

    /// Plan with every item `allowed` and selected.
    pub fn default_plan(&self) -> DietPlan {
        self.merge(&Value::Null)
    }

    /// Merges a model response onto the taxonomy.
    ///
    /// For each category and item, in taxonomy order, the first entry in
    /// `output[category]` whose `name` equals the item name exactly supplies the status. A
    /// missing entry or an unrecognised status yields `allowed`. Every item starts selected.
    pub fn merge(&self, output: &Value) -> DietPlan {
        let categories = self
            .categories
            .iter()
            .map(|category| {
                let proposed = output.get(&category.name).and_then(Value::as_array);
                DietCategory {
                    category: category.name.clone(),
                    items: category
                        .items
                        .iter()
                        .map(|name| DietItem {
                            name: name.clone(),
                            status: proposed
                                .and_then(|entries| proposed_status(entries, name))
                                .unwrap_or_default(),
                            selected: true,
                        })
                        .collect(),
                }
            })
            .collect();

        DietPlan { categories }
    }
}

fn proposed_status(entries: &[Value], item: &str) -> Option<DietStatus> {
    entries
        .iter()
        .find(|entry| entry.get("name").and_then(Value::as_str) == Some(item))?
        .get("status")
        .and_then(Value::as_str)
        .and_then(DietStatus::parse)
}

fn build_diet_prompt(diagnosis: &str, taxonomy: &MasterFoodTaxonomy) -> String {
    format!(
        "The patient has been diagnosed with: {diagnosis}.\n\
         You are a Clinical Dietician.\n\n\
         Here is the Master List of food items categorized:\n\
         {items}\n\n\
         For EACH item in the master list, assign a status: 'allowed', 'limited', or 'avoid' \
         based on the diagnosis.\n\n\
         Return a JSON object where keys are the category names and values are arrays of \
         objects with {{ \"name\": \"ItemName\", \"status\": \"allowed\" | \"limited\" | \"avoid\" }}.\n\
         Ensure ALL items from the master list are included.\n",
        diagnosis = diagnosis.trim(),
        items = taxonomy.to_json(),
    )
}

/// Produces diet plans for a diagnosis.
#[derive(Clone)]
pub struct DietPlanner {
    generator: Arc<dyn Generator>,
    taxonomy: Arc<MasterFoodTaxonomy>,
}

impl DietPlanner {
    /// Planner over the standard taxonomy.
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self::with_taxonomy(generator, MasterFoodTaxonomy::standard())
    }

    pub fn with_taxonomy(generator: Arc<dyn Generator>, taxonomy: Arc<MasterFoodTaxonomy>) -> Self {
        Self {
            generator,
            taxonomy,
        }
    }

    pub fn taxonomy(&self) -> &MasterFoodTaxonomy {
        &self.taxonomy
    }

    /// Generates a plan. Falls back to the all-allowed plan if the model call fails.
    pub async fn generate(&self, diagnosis: &str) -> DietPlan {
        match self.try_generate(diagnosis).await {
            Ok(plan) => plan,
            Err(e) => {
                tracing::error!("diet generation error: {e}");
                self.taxonomy.default_plan()
            }
        }
    }

    /// # Errors
    ///
    /// Returns `CoreError::InvalidInput` for a blank diagnosis, or the generator's error.
    pub async fn try_generate(&self, diagnosis: &str) -> CoreResult<DietPlan> {
        if diagnosis.trim().is_empty() {
            return Err(CoreError::InvalidInput("diagnosis cannot be empty".into()));
        }
        tracing::info!("generating diet plan for diagnosis: {}", diagnosis.trim());

        let prompt = build_diet_prompt(diagnosis, &self.taxonomy);
        let output = self.generator.generate(&prompt, &ResponseFormat::Json).await?;
        let plan = self.taxonomy.merge(&output);

        let classified = self
            .taxonomy
            .categories
            .iter()
            .flat_map(|c| c.items.iter().map(move |i| (c, i)))
            .filter(|(c, i)| {
                output
                    .get(&c.name)
                    .and_then(Value::as_array)
                    .and_then(|entries| proposed_status(entries, i))
                    .is_some()
            })
            .count();
        let total = self.taxonomy.item_count();
        if classified < total {
            tracing::warn!(
                "model classified {classified} of {total} diet items; the rest default to allowed"
            );
        } else {
            tracing::info!("diet plan generated successfully");
        }

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{model_failure, FnGenerator, ScriptedGenerator};
    use serde_json::json;

    fn taxonomy(entries: &[(&str, &[&str])]) -> Arc<MasterFoodTaxonomy> {
        Arc::new(
            MasterFoodTaxonomy::new(entries.iter().map(|(c, items)| {
                (
                    (*c).to_string(),
                    items.iter().map(|i| (*i).to_string()).collect::<Vec<_>>(),
                )
            }))
            .expect("taxonomy"),
        )
    }

    fn pair_set(plan: &DietPlan) -> Vec<(String, String)> {
        plan.pairs()
            .map(|(c, i)| (c.to_string(), i.name.clone()))
            .collect()
    }

    fn taxonomy_pairs(t: &MasterFoodTaxonomy) -> Vec<(String, String)> {
        t.category_names()
            .flat_map(|c| {
                t.items(c)
                    .unwrap_or_default()
                    .iter()
                    .map(move |i| (c.to_string(), i.clone()))
            })
            .collect()
    }

    #[test]
    fn standard_taxonomy_passes_validation() {
        let standard = MasterFoodTaxonomy::standard();
        let rebuilt = MasterFoodTaxonomy::new(STANDARD_TAXONOMY.iter().map(|(c, items)| {
            (
                (*c).to_string(),
                items.iter().map(|i| (*i).to_string()).collect::<Vec<_>>(),
            )
        }))
        .expect("standard taxonomy is valid");
        assert_eq!(*standard, rebuilt);
        assert_eq!(standard.category_names().count(), 18);
        assert_eq!(standard.category_names().next(), Some("Deep Fried food"));
    }

    #[test]
    fn prompt_lists_categories_in_taxonomy_order() {
        let standard = MasterFoodTaxonomy::standard();
        let rendered = standard.to_json();
        let keys: Vec<&str> = rendered
            .as_object()
            .expect("object")
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, standard.category_names().collect::<Vec<_>>());
        assert!(rendered.to_string().starts_with("{\"Deep Fried food\""));

        let prompt = build_diet_prompt("gout", &standard);
        let fried = prompt.find("\"Deep Fried food\"").expect("first category");
        let cold = prompt.find("\"Cold drinks\"").expect("cold drinks");
        assert!(fried < cold);
    }

    #[test]
    fn taxonomy_rejects_duplicates() {
        let err = MasterFoodTaxonomy::new(vec![(
            "Sweets".to_string(),
            vec!["Sugar".to_string(), "Sugar".to_string()],
        )])
        .expect_err("duplicate item");
        assert!(matches!(err, CoreError::InvalidInput(_)));

        let err = MasterFoodTaxonomy::new(vec![
            ("Sweets".to_string(), vec!["Sugar".to_string()]),
            ("Sweets".to_string(), vec!["Honey".to_string()]),
        ])
        .expect_err("duplicate category");
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[test]
    fn partial_output_is_completed_with_allowed() {
        let t = taxonomy(&[("Sweets", &["Sugar", "Honey"])]);
        let plan = t.merge(&json!({ "Sweets": [{ "name": "Sugar", "status": "avoid" }] }));

        assert_eq!(
            plan.categories(),
            &[DietCategory {
                category: "Sweets".into(),
                items: vec![
                    DietItem {
                        name: "Sugar".into(),
                        status: DietStatus::Avoid,
                        selected: true
                    },
                    DietItem {
                        name: "Honey".into(),
                        status: DietStatus::Allowed,
                        selected: true
                    },
                ],
            }]
        );
    }

    #[test]
    fn extra_unknown_and_invalid_entries_are_ignored() {
        let t = taxonomy(&[("Sweets", &["Sugar", "Honey"]), ("Sea food", &["Fish"])]);
        let plan = t.merge(&json!({
            "Sweets": [
                { "name": "sugar", "status": "avoid" },
                { "name": "Honey", "status": "forbidden" },
                { "name": "Chocolate", "status": "avoid" }
            ],
            "Snacks": [{ "name": "Chips", "status": "avoid" }],
            "Sea food": "avoid everything"
        }));

        assert_eq!(pair_set(&plan), taxonomy_pairs(&t));
        assert!(plan.pairs().all(|(_, i)| i.status == DietStatus::Allowed));
    }

    #[test]
    fn first_matching_entry_wins_and_status_case_is_ignored() {
        let t = taxonomy(&[("Liquids", &["Water"])]);
        let plan = t.merge(&json!({
            "Liquids": [
                { "name": "Water", "status": " Limited " },
                { "name": "Water", "status": "avoid" }
            ]
        }));
        assert_eq!(plan.categories()[0].items[0].status, DietStatus::Limited);
    }

    #[tokio::test]
    async fn plan_always_matches_taxonomy_shape() {
        let outputs = vec![
            Ok(json!({})),
            Ok(json!(null)),
            Ok(json!([1, 2, 3])),
            Ok(json!({ "Fruits": [{ "name": "Mango", "status": "avoid" }] })),
            Err(model_failure("timeout")),
        ];
        let planner = DietPlanner::new(Arc::new(ScriptedGenerator::new(outputs)));
        let expected = taxonomy_pairs(planner.taxonomy());

        for _ in 0..5 {
            let plan = planner.generate("Type 2 Diabetes").await;
            let pairs = pair_set(&plan);
            assert_eq!(pairs, expected);
            let unique: HashSet<_> = pairs.iter().collect();
            assert_eq!(unique.len(), pairs.len());
            assert!(plan.pairs().all(|(_, i)| i.selected));
        }
    }

    #[tokio::test]
    async fn failure_returns_all_allowed_plan() {
        let planner = DietPlanner::new(Arc::new(ScriptedGenerator::new(vec![Err(
            model_failure("503"),
        )])));
        let plan = planner.generate("Gastritis").await;
        assert_eq!(plan, planner.taxonomy().default_plan());
        assert!(plan.pairs().all(|(_, i)| i.status == DietStatus::Allowed));
    }

    #[tokio::test]
    async fn blank_diagnosis_skips_the_model() {
        let generator = Arc::new(FnGenerator::new(|_, _| Ok(json!({}))));
        let planner = DietPlanner::new(generator.clone());
        let plan = planner.generate("   ").await;
        assert_eq!(plan, planner.taxonomy().default_plan());
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn prompt_lists_every_category() {
        let generator = Arc::new(FnGenerator::new(|_, format| {
            assert_eq!(format, &ResponseFormat::Json);
            Ok(json!({}))
        }));
        let t = taxonomy(&[("Sweets", &["Sugar", "Honey"]), ("Tubers", &["Potato"])]);
        let planner = DietPlanner::with_taxonomy(generator.clone(), t);

        planner.generate("Diabetes").await;
        let prompt = &generator.prompts()[0];
        assert!(prompt.contains("diagnosed with: Diabetes."));
        assert!(prompt.contains(r#""Sweets":["Sugar","Honey"]"#));
        assert!(prompt.contains(r#""Tubers":["Potato"]"#));
    }

    #[test]
    fn editing_helpers_and_selected_plan() {
        let t = taxonomy(&[("Sweets", &["Sugar", "Honey"]), ("Tubers", &["Potato"])]);
        let mut plan = t.default_plan();

        assert!(plan.set_status("Sweets", "Sugar", DietStatus::Avoid));
        assert!(!plan.set_status("Sweets", "Chocolate", DietStatus::Avoid));
        assert_eq!(plan.toggle_selected("Sweets", "Honey"), Some(false));
        assert_eq!(plan.toggle_selected("Tubers", "Potato"), Some(false));
        assert_eq!(plan.toggle_selected("Tubers", "Yam"), None);

        let printed = plan.selected_plan();
        assert_eq!(printed.len(), 1);
        assert_eq!(printed[0].category, "Sweets");
        assert_eq!(printed[0].items.len(), 1);
        assert_eq!(printed[0].items[0].status, DietStatus::Avoid);
    }

    #[test]
    fn plan_serialises_as_category_array() {
        let t = taxonomy(&[("Sea food", &["Fish"])]);
        let value = serde_json::to_value(t.default_plan()).expect("serialise");
        assert_eq!(
            value,
            json!([{ "category": "Sea food", "items": [
                { "name": "Fish", "status": "allowed", "selected": true }
            ]}])
        );
    }
}
