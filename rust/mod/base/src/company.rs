use hexya_orm::{Environment, FieldDef, ModelDef, OrmError, RecordSet};
use serde_json::Value;

/// Id of the main company created by the seed data.
pub const MAIN_COMPANY_ID: i64 = 1;

pub fn company_model() -> ModelDef {
    ModelDef::new("Company")
        .description("Companies")
        .with_field(FieldDef::char("Name").string("Company Name").required())
        .with_field(FieldDef::many2one("Parent", "Company").string("Parent Company"))
        .with_field(
            FieldDef::one2many("Children", "Company", "parent_id").string("Child Companies"),
        )
        .with_field(FieldDef::many2one("Partner", "Partner"))
        .with_field(FieldDef::char("Tagline").string("Company Tagline"))
        .with_field(FieldDef::binary("Logo"))
        .with_field(FieldDef::many2one("Currency", "Currency").default_fn(default_currency))
        .with_field(FieldDef::char("Street"))
        .with_field(FieldDef::char("Street2"))
        .with_field(FieldDef::char("Zip"))
        .with_field(FieldDef::char("City"))
        .with_field(FieldDef::many2one("Country", "Country"))
        .with_field(FieldDef::char("Email"))
        .with_field(FieldDef::char("Phone"))
        .with_field(FieldDef::char("Website"))
        .with_field(FieldDef::char("VAT").json("vat").string("Tax ID"))
        .with_field(FieldDef::char("CompanyRegistry"))
        .with_constraint("check_parent", &["parent_id"], check_parent)
}

/// The currency of the main company, if any.
fn default_currency(env: &Environment) -> Result<Value, OrmError> {
    let main = env.browse("Company", &[MAIN_COMPANY_ID])?.exists()?;
    if main.is_empty() {
        return Ok(Value::Null);
    }
    main.get("currency_id")
}

/// A company cannot be its own ancestor.
fn check_parent(rs: &RecordSet) -> Result<(), OrmError> {
    for company in rs.records() {
        let mut seen = vec![company.id()];
        let mut current = company.get("parent_id")?;
        while let Some(id) = current.as_i64() {
            if seen.contains(&id) {
                return Err(OrmError::ConstraintViolation(
                    "Error! You can not create recursive companies.".to_string(),
                ));
            }
            seen.push(id);
            current = company.env().browse("Company", &[id])?.get("parent_id")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use hexya_orm::{OrmError, RecordData};
    use serde_json::json;

    use crate::testutil::{run, seeded_orm};

    fn company(name: &str, parent: Option<i64>) -> RecordData {
        let mut data = RecordData::new("Company");
        data.set("name", json!(name));
        if let Some(parent) = parent {
            data.set("parent_id", json!(parent));
        }
        data
    }

    #[test]
    fn new_company_gets_main_currency() {
        let orm = seeded_orm();
        let (main, new) = run(&orm, |env| {
            let pool = env.pool("Company")?;
            let created = pool.create(&company("Company4", None))?;
            Ok((pool.browse_one(1).get("currency_id")?, created.get("currency_id")?))
        })
        .unwrap();
        assert_eq!(main, new);
        assert!(new.is_number());
    }

    #[test]
    fn recursive_companies_are_rejected() {
        let orm = seeded_orm();
        let err = run(&orm, |env| {
            let pool = env.pool("Company")?;
            let a = pool.create(&company("A", Some(1)))?;
            let b = pool.create(&company("B", Some(a.id())))?;
            a.write(&company("A", Some(b.id())))
        })
        .unwrap_err();
        assert!(matches!(err, OrmError::ConstraintViolation(_)));
    }
}
