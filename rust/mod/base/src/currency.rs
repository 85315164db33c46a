use hexya_orm::{FieldDef, ModelDef, OrmError, RecordSet};
use serde_json::Value;

pub fn currency_model() -> ModelDef {
    ModelDef::new("Currency")
        .description("Currency")
        .with_order("name")
        .with_field(
            FieldDef::char("Name")
                .string("Currency")
                .help("Currency Code [ISO 4217]")
                .required(),
        )
        .with_field(
            FieldDef::char("Symbol").help("Currency sign, to be used when printing amounts"),
        )
        .with_field(FieldDef::one2many("Rates", "CurrencyRate", "currency_id"))
        .with_field(FieldDef::float("Rounding").string("Rounding Factor").default_value(0.01))
        .with_field(FieldDef::integer("DecimalPlaces").default_value(2))
        .with_field(FieldDef::boolean("Active").default_value(true))
        .with_field(
            FieldDef::selection(
                "Position",
                &[("after", "After Amount"), ("before", "Before Amount")],
            )
            .string("Symbol Position")
                .default_value("after"),
        )
        .with_constraint("rounding_gt_zero", &["rounding"], check_rounding)
}

fn check_rounding(rs: &RecordSet) -> Result<(), OrmError> {
    for currency in rs.records() {
        if let Value::Number(n) = currency.get("rounding")? {
            if n.as_f64().is_some_and(|r| r <= 0.0) {
                return Err(OrmError::ConstraintViolation(
                    "The rounding factor must be greater than 0!".to_string(),
                ));
            }
        }
    }
    Ok(())
}

pub fn currency_rate_model() -> ModelDef {
    ModelDef::new("CurrencyRate")
        .description("Currency Rate")
        .with_order("name")
        .with_field(FieldDef::date("Name").string("Date").required())
        .with_field(
            FieldDef::float("Rate")
                .help("The rate of the currency to the currency of rate 1")
                .default_value(1.0),
        )
        .with_field(FieldDef::many2one("Currency", "Currency").readonly())
        .with_field(FieldDef::many2one("Company", "Company"))
}

pub fn country_model() -> ModelDef {
    ModelDef::new("Country")
        .description("Country")
        .with_order("name")
        .with_field(FieldDef::char("Name").string("Country Name").required())
        .with_field(
            FieldDef::char("Code")
                .string("Country Code")
                .help("The ISO country code in two chars."),
        )
        .with_field(FieldDef::many2one("Currency", "Currency"))
        .with_field(FieldDef::integer("PhoneCode").string("Country Calling Code"))
}
