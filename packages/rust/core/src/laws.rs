//! Reference list of the main Kazakhstan codes cited in analyses.

use serde::Serialize;

/// A law with a link to its official text on adilet.zan.kz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LawReference {
    pub name: &'static str,
    pub url: &'static str,
}

const LAWS: &[LawReference] = &[
    LawReference {
        name: "Гражданский кодекс РК",
        url: "https://adilet.zan.kz/rus/docs/K950001000_",
    },
    LawReference {
        name: "Налоговый кодекс РК",
        url: "https://adilet.zan.kz/rus/docs/K2100000409",
    },
    LawReference {
        name: "Трудовой кодекс РК",
        url: "https://adilet.zan.kz/rus/docs/K1500000011",
    },
    LawReference {
        name: "КоАП РК",
        url: "https://adilet.zan.kz/rus/docs/K1400000233",
    },
];

/// Laws most often relevant to a document review.
pub fn relevant_laws() -> Vec<LawReference> {
    LAWS.to_vec()
}
