use hexya_domain::{Condition, Operator};
use hexya_orm::{Environment, FieldDef, ModelDef, OnchangeValues, OrmError, RecordSet};
use serde_json::{json, Value};

pub fn partner_model() -> ModelDef {
    ModelDef::new("Partner")
        .description("Contact")
        .with_order("name")
        .with_field(FieldDef::char("Name").required())
        .with_field(
            FieldDef::selection(
                "Type",
                &[
                    ("contact", "Contact"),
                    ("invoice", "Invoice address"),
                    ("delivery", "Shipping address"),
                    ("other", "Other address"),
                ],
            )
            .string("Address Type")
            .default_value("contact"),
        )
        .with_field(
            FieldDef::boolean("IsCompany")
                .help("Check if the contact is a company, otherwise it is a person")
                .default_value(false),
        )
        .with_field(
            FieldDef::selection("CompanyType", &[("person", "Individual"), ("company", "Company")])
                .string("Company Type")
                .default_value("person"),
        )
        .with_field(
            FieldDef::many2one("Parent", "Partner")
                .string("Related Company")
                .filter(Condition::leaf("is_company", Operator::Equals, Value::Bool(true))),
        )
        .with_field(FieldDef::one2many("Children", "Partner", "parent_id").string("Contacts"))
        .with_field(FieldDef::many2one("Company", "Company"))
        .with_field(FieldDef::char("CompanyName"))
        .with_field(FieldDef::many2one("User", "User").string("Salesperson"))
        .with_field(FieldDef::char("Street"))
        .with_field(FieldDef::char("Street2"))
        .with_field(FieldDef::char("Zip"))
        .with_field(FieldDef::char("City"))
        .with_field(FieldDef::many2one("Country", "Country"))
        .with_field(FieldDef::char("Email"))
        .with_field(FieldDef::char("Phone"))
        .with_field(FieldDef::char("Mobile"))
        .with_field(FieldDef::char("Website"))
        .with_field(FieldDef::char("Function").string("Job Position"))
        .with_field(FieldDef::char("Lang").string("Language").default_fn(context_lang))
        .with_field(FieldDef::text("Comment").string("Notes"))
        .with_field(FieldDef::boolean("Customer").default_value(true))
        .with_field(FieldDef::boolean("Supplier"))
        .with_field(FieldDef::char("Ref").string("Internal Reference"))
        .with_field(FieldDef::boolean("Active").default_value(true))
        .with_constraint("check_email", &["email"], check_email)
        .with_onchange("company_type", company_type_changed)
        .with_onchange("is_company", is_company_changed)
        .with_onchange("parent_id", parent_changed)
}

/// Language of the context, `en_US` when unset.
pub(crate) fn context_lang(env: &Environment) -> Result<Value, OrmError> {
    Ok(match env.context().get_str("lang") {
        "" => json!("en_US"),
        lang => json!(lang),
    })
}

fn check_email(rs: &RecordSet) -> Result<(), OrmError> {
    for partner in rs.records() {
        if let Value::String(email) = partner.get("email")? {
            let valid = email
                .split_once('@')
                .is_some_and(|(user, domain)| !user.is_empty() && !domain.is_empty());
            if !valid {
                return Err(OrmError::ConstraintViolation(format!(
                    "Invalid email address: {}",
                    email
                )));
            }
        }
    }
    Ok(())
}

fn company_type_changed(_rs: &RecordSet, values: &mut OnchangeValues) -> Result<(), OrmError> {
    let is_company = values.get("company_type") == Some(&json!("company"));
    values.set("is_company", json!(is_company));
    Ok(())
}

fn is_company_changed(_rs: &RecordSet, values: &mut OnchangeValues) -> Result<(), OrmError> {
    let company_type = match values.get("is_company") {
        Some(Value::Bool(true)) => "company",
        _ => "person",
    };
    values.set("company_type", json!(company_type));
    Ok(())
}

/// Contacts of a company default to its address.
fn parent_changed(rs: &RecordSet, values: &mut OnchangeValues) -> Result<(), OrmError> {
    let Some(parent_id) = values.get("parent_id").and_then(Value::as_i64) else {
        return Ok(());
    };
    let parent = rs.env().browse("Partner", &[parent_id])?.exists()?;
    if parent.is_empty() {
        return Ok(());
    }
    let address_empty = ["street", "city", "zip"]
        .iter()
        .all(|f| matches!(values.get(f), None | Some(Value::Null) | Some(Value::Bool(false))));
    if !address_empty {
        return Ok(());
    }
    for field in ["street", "street2", "city", "zip", "country_id"] {
        let value = parent.get(field)?;
        if !matches!(value, Value::Null | Value::Bool(false)) {
            values.set(field, value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use hexya_orm::{OnchangeParams, OrmError, RecordData};
    use serde_json::json;

    use crate::testutil::{run, seeded_orm};

    fn partner(v: serde_json::Value) -> RecordData {
        RecordData::from_map("Partner", serde_json::from_value(v).unwrap())
    }

    #[test]
    fn defaults_of_a_new_partner() {
        let orm = seeded_orm();
        let defaults = run(&orm, |env| {
            env.pool("Partner")?
                .with_context("lang", "fr_BE")
                .default_get(&[
                    "active".into(),
                    "is_company".into(),
                    "company_type".into(),
                    "lang".into(),
                ])
        })
        .unwrap();
        assert_eq!(defaults.get("active"), Some(&json!(true)));
        assert_eq!(defaults.get("is_company"), Some(&json!(false)));
        assert_eq!(defaults.get("company_type"), Some(&json!("person")));
        assert_eq!(defaults.get("lang"), Some(&json!("fr_BE")));
    }

    #[test]
    fn email_is_checked() {
        let orm = seeded_orm();
        let err = run(&orm, |env| {
            env.pool("Partner")?.create(&partner(json!({"name": "Bad", "email": "nope"})))
        })
        .unwrap_err();
        assert!(matches!(err, OrmError::ConstraintViolation(_)));
    }

    #[test]
    fn company_type_sets_is_company() {
        let orm = seeded_orm();
        let result = run(&orm, |env| {
            env.pool("Partner")?.onchange(&OnchangeParams {
                values: partner(json!({"company_type": "company", "is_company": false})),
                field_name: vec!["company_type".into()],
                field_onchange: json!({}),
            })
        })
        .unwrap();
        assert_eq!(result.value.fields.len(), 1);
        assert_eq!(result.value.get("is_company"), Some(&json!(true)));
    }

    #[test]
    fn contact_inherits_parent_address() {
        let orm = seeded_orm();
        let result = run(&orm, |env| {
            let pool = env.pool("Partner")?;
            let parent =
                pool.create(&partner(json!({"name": "Agrolait", "city": "Wavre", "zip": "1300"})))?;
            pool.onchange(&OnchangeParams {
                values: partner(json!({"parent_id": parent.id(), "city": false})),
                field_name: vec!["parent_id".into()],
                field_onchange: json!({}),
            })
        })
        .unwrap();
        assert_eq!(result.value.get("city"), Some(&json!("Wavre")));
        assert_eq!(result.value.get("zip"), Some(&json!("1300")));
        assert!(result.value.get("street").is_none());
    }
}
