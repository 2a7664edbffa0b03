use crate::app::catalog::{FieldUpdate, NewRecord};
use crate::core::transform::{classify_tier, classify_trend, round2, Category, Trend};
use crate::domain::model::{CleanRecord, Document, RawRecord};
use crate::domain::ports::Transformer;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_non_negative, Validate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Icon used for coins created by hand.
pub const DEFAULT_COIN_IMAGE: &str = "https://cdn-icons-png.flaticon.com/512/1213/1213779.png";

/// Natural key used by the assistant to address a coin.
pub const COIN_NATURAL_KEY: &str = "nom";

/// Market snapshot of one coin, as read by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinSnapshot {
    pub nom: String,
    pub symbole: String,
    pub prix_usd: f64,
    pub variation_24h: f64,
    pub tendance: Trend,
    pub categorie: Category,
    pub image: Option<String>,
    pub market_cap: f64,
}

impl CleanRecord for CoinSnapshot {
    const FIELDS: &'static [&'static str] = &[
        "nom",
        "symbole",
        "prix_usd",
        "variation_24h",
        "tendance",
        "categorie",
        "image",
        "market_cap",
    ];
}

/// CoinGecko `/coins/markets` entry → [`CoinSnapshot`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CoinTransformer;

impl Transformer for CoinTransformer {
    type Output = CoinSnapshot;

    fn transform(&self, raw: &RawRecord) -> CoinSnapshot {
        let change = raw.f64_field("price_change_percentage_24h");

        CoinSnapshot {
            nom: raw.str_field("name").unwrap_or_default().to_string(),
            symbole: raw.str_field("symbol").unwrap_or_default().to_uppercase(),
            prix_usd: round2(raw.f64_field("current_price").unwrap_or(0.0)),
            variation_24h: round2(change.unwrap_or(0.0)),
            tendance: classify_trend(change),
            categorie: classify_tier(raw.u64_field("market_cap_rank")),
            image: raw.str_field("image").map(str::to_string),
            market_cap: raw.f64_field("market_cap").unwrap_or(0.0),
        }
    }
}

/// Input of the `create` entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCoin {
    pub nom: String,
    pub symbole: String,
    #[serde(alias = "prix")]
    pub prix_usd: f64,
    pub categorie: String,
}

impl Validate for NewCoin {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("nom", &self.nom)?;
        validate_non_empty_string("symbole", &self.symbole)?;
        validate_non_negative("prix_usd", self.prix_usd)?;
        parse_category(&self.categorie)?;
        Ok(())
    }
}

impl NewRecord for NewCoin {
    type Clean = CoinSnapshot;

    fn into_clean(self) -> Result<CoinSnapshot> {
        Ok(CoinSnapshot {
            categorie: parse_category(&self.categorie)?,
            nom: self.nom.trim().to_string(),
            symbole: self.symbole.trim().to_uppercase(),
            prix_usd: self.prix_usd,
            variation_24h: 0.0,
            tendance: Trend::New,
            image: Some(DEFAULT_COIN_IMAGE.to_string()),
            market_cap: 0.0,
        })
    }
}

/// Partial update; only the fields present are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoinUpdate {
    #[serde(default, alias = "prix")]
    pub prix_usd: Option<f64>,
    #[serde(default)]
    pub categorie: Option<String>,
    #[serde(default)]
    pub market_cap: Option<f64>,
}

impl Validate for CoinUpdate {
    fn validate(&self) -> Result<()> {
        if self.prix_usd.is_none() && self.categorie.is_none() && self.market_cap.is_none() {
            return Err(EtlError::validation("update", "No fields to update"));
        }
        if let Some(prix) = self.prix_usd {
            validate_non_negative("prix_usd", prix)?;
        }
        if let Some(cap) = self.market_cap {
            validate_non_negative("market_cap", cap)?;
        }
        if let Some(categorie) = &self.categorie {
            parse_category(categorie)?;
        }
        Ok(())
    }
}

impl FieldUpdate for CoinUpdate {
    fn into_fields(self) -> Result<Document> {
        let mut fields = Document::new();
        if let Some(prix) = self.prix_usd {
            fields.insert("prix_usd".to_string(), Value::from(prix));
        }
        if let Some(categorie) = &self.categorie {
            fields.insert(
                "categorie".to_string(),
                serde_json::to_value(parse_category(categorie)?)?,
            );
        }
        if let Some(cap) = self.market_cap {
            fields.insert("market_cap".to_string(), Value::from(cap));
        }
        Ok(fields)
    }
}

fn parse_category(value: &str) -> Result<Category> {
    value
        .parse::<Category>()
        .map_err(|reason| EtlError::validation("categorie", reason))
}
