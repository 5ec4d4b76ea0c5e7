use std::sync::Arc;

use serde_json::json;
use trellis::{
    value, value_as, ClassDef, FrameworkError, HttpResponse, MethodDef, ParamDef, Request, Value,
    View,
};

use crate::models::UserRepository;

pub const NAME: &str = "UserController";

pub struct UserController {
    views: Arc<View>,
    users: Arc<UserRepository>,
}

pub fn descriptor() -> ClassDef {
    ClassDef::new(NAME)
        .param(ParamDef::service("views", "View"))
        .param(ParamDef::service("users", UserRepository::NAME))
        .constructor(|_, args| {
            Ok(value(UserController {
                views: args.get::<View>(0)?,
                users: args.get::<UserRepository>(1)?,
            }))
        })
        .method(
            "index",
            MethodDef::new(|_, receiver, _| {
                value_as::<UserController>(&receiver, NAME)?.index()
            }),
        )
        .method(
            "show",
            MethodDef::new(|_, receiver, args| {
                let this = value_as::<UserController>(&receiver, NAME)?;
                this.show(&args.string(0)?)
            })
            .param(ParamDef::primitive("id", "String")),
        )
        .method(
            "edit",
            MethodDef::new(|_, receiver, args| {
                let this = value_as::<UserController>(&receiver, NAME)?;
                this.edit(&args.string(0)?)
            })
            .param(ParamDef::primitive("id", "String")),
        )
        .method(
            "update",
            MethodDef::new(|_, receiver, args| {
                let this = value_as::<UserController>(&receiver, NAME)?;
                let id = args.string(0)?;
                let request = args.get::<Request>(1)?;
                this.update(&id, &request)
            })
            .param(ParamDef::primitive("id", "String"))
            .param(ParamDef::service("request", "Request")),
        )
}

impl UserController {
    fn index(&self) -> Result<Value, FrameworkError> {
        let html = self
            .views
            .make("users.index", json!({ "users": self.users.all() }))?;
        Ok(value(HttpResponse::html(&html)))
    }

    fn show(&self, id: &str) -> Result<Value, FrameworkError> {
        let user = self.lookup(id)?;
        let html = self.views.make("users.show", json!({ "user": user }))?;
        Ok(value(HttpResponse::html(&html)))
    }

    fn edit(&self, id: &str) -> Result<Value, FrameworkError> {
        let user = self.lookup(id)?;
        let html = self.views.make("users.edit", json!({ "user": user }))?;
        Ok(value(HttpResponse::html(&html)))
    }

    fn update(&self, id: &str, request: &Request) -> Result<Value, FrameworkError> {
        let user_id = parse_id(id)?;
        let name = request
            .input("name")
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| FrameworkError::domain("The name field is required.", 422))?;
        if !self.users.rename(user_id, name.trim()) {
            return Err(FrameworkError::domain("User not found.", 404));
        }
        Ok(value(HttpResponse::redirect(&format!("/users/{}", user_id))))
    }

    fn lookup(&self, id: &str) -> Result<serde_json::Value, FrameworkError> {
        self.users
            .find(parse_id(id)?)
            .ok_or_else(|| FrameworkError::domain("User not found.", 404))
    }
}

fn parse_id(raw: &str) -> Result<u64, FrameworkError> {
    raw.parse()
        .map_err(|_| FrameworkError::domain("Invalid user id.", 404))
}
