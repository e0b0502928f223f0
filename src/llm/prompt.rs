use minijinja::{context, Environment};

use crate::db::catalog::SchemaDescription;

const TEMPLATE_NAME: &str = "sql_prompt.txt";

/// Renders the instruction sent to the model. Compiled once, rendered per request.
pub struct PromptBuilder {
    env: Environment<'static>,
}

impl PromptBuilder {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template(TEMPLATE_NAME, include_str!("../../templates/sql_prompt.txt"))?;
        Ok(Self { env })
    }

    pub fn render(
        &self,
        question: &str,
        schema: &SchemaDescription,
    ) -> Result<String, minijinja::Error> {
        self.env
            .get_template(TEMPLATE_NAME)?
            .render(context! { question => question, schema => schema })
    }
}
