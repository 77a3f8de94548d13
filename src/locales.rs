use std::collections::HashMap;

/// Character-set ids the engine can decode. The materializer refuses
/// VARCHAR/CHAR/CLOB columns whose resolved charset id is not listed here.
///
/// Ids are Oracle NLS charset numbers (`NLS_CHARSET_ID`).
#[derive(Debug)]
pub struct Locales {
    pub character_map: HashMap<u64, &'static str>,
}

impl Default for Locales {
    fn default() -> Self {
        let character_map = HashMap::from([
            (1, "US7ASCII"),
            (2, "WE8DEC"),
            (31, "WE8ISO8859P1"),
            (46, "WE8ISO8859P15"),
            (170, "EE8ISO8859P2"),
            (178, "WE8MSWIN1252"),
            (871, "UTF8"),
            (872, "UTFE"),
            (873, "AL32UTF8"),
            (2000, "AL16UTF16"),
            (2002, "AL16UTF16LE"),
        ]);
        Self { character_map }
    }
}

impl Locales {
    pub fn supports(&self, charset_id: u64) -> bool {
        self.character_map.contains_key(&charset_id)
    }
}
