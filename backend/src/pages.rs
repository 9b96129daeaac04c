use minijinja::{Environment, context};

use crate::storage::filename::ALLOWED_EXTENSIONS;

/// Server-rendered HTML for the browser flow.
pub struct Pages {
    env: Environment<'static>,
}

impl Pages {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template("index.html", include_str!("../templates/index.html"))?;
        env.add_template("pred.html", include_str!("../templates/pred.html"))?;
        Ok(Self { env })
    }

    pub fn index(&self) -> Result<String, minijinja::Error> {
        self.env
            .get_template("index.html")?
            .render(context! { allowed_extensions => ALLOWED_EXTENSIONS })
    }

    pub fn prediction(
        &self,
        pred: Option<&str>,
        f_name: Option<&str>,
    ) -> Result<String, minijinja::Error> {
        self.env
            .get_template("pred.html")?
            .render(context! { pred => pred, f_name => f_name })
    }
}
