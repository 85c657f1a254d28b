//! Recipe repository

use std::collections::BTreeMap;
use std::fmt;

use crate::core::recipe::Recipe;
use crate::error::RecipeError;
use crate::recipes;

/// Recipes by name
#[derive(Default)]
pub struct Repository {
    recipes: BTreeMap<String, Box<dyn Recipe>>,
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.recipes.keys()).finish()
    }
}

impl Repository {
    /// Empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recipe shipped with this crate
    pub fn builtin() -> Self {
        recipes::all()
            .into_iter()
            .fold(Self::new(), Self::register)
    }

    /// Add a recipe, replacing any with the same name
    #[must_use]
    pub fn register(mut self, recipe: Box<dyn Recipe>) -> Self {
        self.recipes.insert(recipe.name().to_string(), recipe);
        self
    }

    /// Look up a recipe
    pub fn get(&self, name: &str) -> Result<&dyn Recipe, RecipeError> {
        self.recipes
            .get(name)
            .map(AsRef::as_ref)
            .ok_or_else(|| RecipeError::UnknownRecipe {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.recipes.contains_key(name)
    }

    /// Recipes in name order
    pub fn iter(&self) -> impl Iterator<Item = &dyn Recipe> {
        self.recipes.values().map(AsRef::as_ref)
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}
