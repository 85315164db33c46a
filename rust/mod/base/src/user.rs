use hexya_domain::{Condition, Operator};
use hexya_orm::{Environment, FieldDef, ModelDef, OrmError, RecordSet};
use serde_json::Value;

use crate::company::MAIN_COMPANY_ID;
use crate::partner::context_lang;

/// Id of the administrator group created by the seed data.
pub const ADMIN_GROUP_ID: i64 = 1;

pub fn group_model() -> ModelDef {
    ModelDef::new("Group")
        .description("Access Groups")
        .with_order("name")
        .with_field(FieldDef::char("Name").required())
        .with_field(FieldDef::text("Comment"))
}

pub fn user_model() -> ModelDef {
    ModelDef::new("User")
        .description("Users")
        .with_order("login")
        .with_field(FieldDef::char("Name").required())
        .with_field(FieldDef::char("Login").help("Used to log into the system").required())
        .with_field(FieldDef::char("Email"))
        .with_field(FieldDef::many2one("Partner", "Partner").string("Related Partner"))
        .with_field(FieldDef::boolean("Active").default_value(true))
        .with_field(FieldDef::binary("Image"))
        .with_field(FieldDef::char("Lang").string("Language").default_fn(context_lang))
        .with_field(FieldDef::char("TZ").json("tz").string("Timezone"))
        .with_field(FieldDef::text("Signature"))
        .with_field(FieldDef::char("Action").json("action_id").string("Home Action"))
        .with_field(
            FieldDef::many2one("Company", "Company")
                .help("The company this user is currently working for.")
                .required()
                .default_fn(default_company),
        )
        .with_field(
            FieldDef::many2many("Companies", "Company")
                .json("company_ids")
                .default_fn(default_companies),
        )
        .with_field(FieldDef::many2many("Groups", "Group").json("group_ids"))
        .with_field(FieldDef::boolean("Share").string("Share User").readonly())
        .with_constraint("login_key", &["login"], check_login_unique)
        .with_constraint("company_in_companies", &["company_id", "company_ids"], check_company)
}

/// The company of the context, or the main company.
fn default_company(env: &Environment) -> Result<Value, OrmError> {
    let id = env.context().get_i64("company_id").unwrap_or(MAIN_COMPANY_ID);
    let company = env.browse("Company", &[id])?.exists()?;
    Ok(if company.is_empty() { Value::Null } else { Value::from(id) })
}

fn default_companies(env: &Environment) -> Result<Value, OrmError> {
    Ok(match default_company(env)? {
        Value::Null => Value::Array(Vec::new()),
        id => Value::Array(vec![id]),
    })
}

fn check_login_unique(rs: &RecordSet) -> Result<(), OrmError> {
    for user in rs.records() {
        let login = user.get("login")?;
        let cond = Condition::leaf("login", Operator::Equals, login.clone())
            .and(Condition::leaf("id", Operator::NotEquals, Value::from(user.id())));
        if rs.search_count(&cond)? > 0 {
            return Err(OrmError::ConstraintViolation(format!(
                "You can not have two users with the same login: {}",
                login
            )));
        }
    }
    Ok(())
}

/// The current company must be one of the allowed companies, when any
/// are set.
fn check_company(rs: &RecordSet) -> Result<(), OrmError> {
    for user in rs.records() {
        let Some(company) = user.get("company_id")?.as_i64() else {
            continue;
        };
        let allowed = user.get("company_ids")?;
        let ids: Vec<i64> = allowed
            .as_array()
            .map(|a| a.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default();
        if !ids.is_empty() && !ids.contains(&company) {
            return Err(OrmError::ConstraintViolation(
                "The chosen company is not in the allowed companies for this user".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use hexya_orm::{OrmError, RecordData};
    use serde_json::json;

    use crate::testutil::{run, seeded_orm};

    fn user(v: serde_json::Value) -> RecordData {
        RecordData::from_map("User", serde_json::from_value(v).unwrap())
    }

    #[test]
    fn defaults_point_to_main_company() {
        let orm = seeded_orm();
        let defaults = run(&orm, |env| {
            env.pool("User")?
                .with_context("lang", "en_US")
                .default_get(&["company_id".into(), "lang".into(), "active".into()])
        })
        .unwrap();
        assert_eq!(defaults.get("company_id"), Some(&json!([1, "Your Company"])));
        assert_eq!(defaults.get("lang"), Some(&json!("en_US")));
        assert_eq!(defaults.get("active"), Some(&json!(true)));
    }

    #[test]
    fn logins_are_unique() {
        let orm = seeded_orm();
        let err = run(&orm, |env| {
            let pool = env.pool("User")?;
            pool.create(&user(json!({"name": "A", "login": "same@example.com"})))?;
            pool.create(&user(json!({"name": "B", "login": "same@example.com"})))
        })
        .unwrap_err();
        assert!(matches!(err, OrmError::ConstraintViolation(_)));
    }

    #[test]
    fn company_must_be_allowed() {
        let orm = seeded_orm();
        let err = run(&orm, |env| {
            let other = env.pool("Company")?.create(&RecordData::from_map(
                "Company",
                serde_json::from_value(json!({"name": "Other"})).unwrap(),
            ))?;
            env.pool("User")?.create(&user(json!({
                "name": "C",
                "login": "c@example.com",
                "company_id": other.id(),
                "company_ids": [1],
            })))
        })
        .unwrap_err();
        assert!(matches!(err, OrmError::ConstraintViolation(_)));
    }
}
