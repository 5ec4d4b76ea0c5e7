use std::sync::Arc;

use serde_json::json;
use trellis::{
    value, value_as, ClassDef, FrameworkError, HttpResponse, MethodDef, ParamDef, Value, View,
};

pub const NAME: &str = "HomeController";

pub struct HomeController {
    views: Arc<View>,
}

pub fn descriptor() -> ClassDef {
    ClassDef::new(NAME)
        .param(ParamDef::service("views", "View"))
        .constructor(|_, args| {
            Ok(value(HomeController {
                views: args.get::<View>(0)?,
            }))
        })
        .method(
            "index",
            MethodDef::new(|_, receiver, _| {
                value_as::<HomeController>(&receiver, NAME)?.index()
            }),
        )
}

impl HomeController {
    fn index(&self) -> Result<Value, FrameworkError> {
        let html = self.views.make(
            "home",
            json!({
                "title": "Trellis",
                "features": [
                    "Service container",
                    "Regex routing with groups",
                    "Onion middleware pipeline",
                    "Compiled templates",
                ],
            }),
        )?;
        Ok(value(HttpResponse::html(&html)))
    }
}
