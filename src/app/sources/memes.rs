use crate::core::transform::{classify_aspect, AspectFormat};
use crate::domain::model::{CleanRecord, RawRecord};
use crate::domain::ports::Transformer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemeTemplate {
    pub id_original: String,
    pub titre: String,
    pub url_image: Option<String>,
    pub largeur: f64,
    pub hauteur: f64,
    pub nb_zones_texte: u64,
    pub format: AspectFormat,
    pub ratio: f64,
}

impl CleanRecord for MemeTemplate {
    const FIELDS: &'static [&'static str] = &[
        "id_original",
        "titre",
        "url_image",
        "largeur",
        "hauteur",
        "nb_zones_texte",
        "format",
        "ratio",
    ];
}

/// imgflip `get_memes` template → [`MemeTemplate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MemeTransformer;

impl Transformer for MemeTransformer {
    type Output = MemeTemplate;

    fn transform(&self, raw: &RawRecord) -> MemeTemplate {
        let largeur = side(raw, "width");
        let hauteur = side(raw, "height");
        let (format, ratio) = classify_aspect(Some(largeur), Some(hauteur));

        MemeTemplate {
            id_original: raw.id_field("id").unwrap_or_default(),
            titre: raw.str_field("name").unwrap_or_default().to_string(),
            url_image: raw.str_field("url").map(str::to_string),
            largeur,
            hauteur,
            nb_zones_texte: raw.u64_field("box_count").unwrap_or(0),
            format,
            ratio,
        }
    }
}

/// 缺少或非正數的邊長以 1 計
fn side(raw: &RawRecord, key: &str) -> f64 {
    raw.f64_field(key)
        .filter(|v| v.is_finite() && *v > 0.0)
        .unwrap_or(1.0)
}
