use serde::Serialize;
use std::{collections::HashMap, fmt};

use crate::normalize::NormalizedRow;

/// Coarse country filter. Rows match a region through their canonical
/// `country` field, or failing that, when a region keyword occurs as a whole
/// word in any of their values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Region {
    All,
    India,
    UnitedStates,
    UnitedKingdom,
    Canada,
    Australia,
    Germany,
    France,
    Nigeria,
    Kenya,
    SouthAfrica,
    Brazil,
    China,
    Japan,
    UnitedArabEmirates,
    Singapore,
}

impl Region {
    pub const COUNTRIES: [Region; 15] = [
        Region::India,
        Region::UnitedStates,
        Region::UnitedKingdom,
        Region::Canada,
        Region::Australia,
        Region::Germany,
        Region::France,
        Region::Nigeria,
        Region::Kenya,
        Region::SouthAfrica,
        Region::Brazil,
        Region::China,
        Region::Japan,
        Region::UnitedArabEmirates,
        Region::Singapore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::All => "All",
            Region::India => "India",
            Region::UnitedStates => "United States",
            Region::UnitedKingdom => "United Kingdom",
            Region::Canada => "Canada",
            Region::Australia => "Australia",
            Region::Germany => "Germany",
            Region::France => "France",
            Region::Nigeria => "Nigeria",
            Region::Kenya => "Kenya",
            Region::SouthAfrica => "South Africa",
            Region::Brazil => "Brazil",
            Region::China => "China",
            Region::Japan => "Japan",
            Region::UnitedArabEmirates => "United Arab Emirates",
            Region::Singapore => "Singapore",
        }
    }

    /// Lower-case keywords: country names, common abbreviations and a few
    /// major cities / states.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Region::All => &[],
            Region::India => &[
                "india", "in", "ind", "mumbai", "delhi", "bangalore", "bengaluru", "chennai",
                "kolkata", "hyderabad", "pune", "maharashtra", "karnataka",
            ],
            Region::UnitedStates => &[
                "united states", "usa", "us", "u.s.", "america", "new york", "california",
                "texas", "chicago", "los angeles",
            ],
            Region::UnitedKingdom => &[
                "united kingdom", "uk", "u.k.", "england", "scotland", "wales", "london",
                "manchester", "britain",
            ],
            Region::Canada => &["canada", "ca", "toronto", "vancouver", "montreal", "ontario"],
            Region::Australia => &["australia", "au", "aus", "sydney", "melbourne", "brisbane"],
            Region::Germany => &["germany", "de", "deutschland", "berlin", "munich", "hamburg"],
            Region::France => &["france", "fr", "paris", "lyon", "marseille"],
            Region::Nigeria => &["nigeria", "ng", "lagos", "abuja"],
            Region::Kenya => &["kenya", "ke", "nairobi", "mombasa"],
            Region::SouthAfrica => &[
                "south africa", "za", "johannesburg", "cape town", "durban",
            ],
            Region::Brazil => &["brazil", "brasil", "br", "sao paulo", "rio de janeiro"],
            Region::China => &["china", "cn", "beijing", "shanghai", "shenzhen"],
            Region::Japan => &["japan", "jp", "tokyo", "osaka"],
            Region::UnitedArabEmirates => &["united arab emirates", "uae", "dubai", "abu dhabi"],
            Region::Singapore => &["singapore", "sg"],
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let needle = s.trim().to_lowercase();
        if needle.is_empty() || needle == "all" {
            return Some(Region::All);
        }
        Self::COUNTRIES.into_iter().find(|r| {
            r.as_str().eq_ignore_ascii_case(&needle)
                || r.as_str().replace(' ', "_").eq_ignore_ascii_case(&needle)
                || r.keywords().iter().any(|k| *k == needle)
        })
    }

    /// Whether `text` names this region: exact keyword, or keyword as a whole
    /// word inside a longer value ("Pune, India").
    pub fn mentioned_in(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.keywords().iter().any(|k| contains_word(&lower, k))
    }

    pub fn matches(&self, row: &NormalizedRow) -> bool {
        match self {
            Region::All => true,
            _ => match &row.country {
                Some(country) => self.mentioned_in(country),
                None => row.raw_texts().any(|v| self.mentioned_in(&v)),
            },
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two-letter codes are only trusted when they are the whole value, so a
/// stray "in" or "us" inside prose does not count.
fn contains_word(haystack: &str, word: &str) -> bool {
    if word.len() <= 3 && !word.contains('.') {
        return haystack.trim() == word;
    }
    haystack.match_indices(word).any(|(start, _)| {
        let end = start + word.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionCount {
    pub region: Region,
    pub rows: usize,
}

/// Regions present in `rows`, most frequent first (ties by name).
pub fn detect_regions<'a, I>(rows: I) -> Vec<RegionCount>
where
    I: IntoIterator<Item = &'a NormalizedRow>,
{
    let mut counts: HashMap<Region, usize> = HashMap::new();
    for row in rows {
        for region in Region::COUNTRIES {
            if region.matches(row) {
                *counts.entry(region).or_default() += 1;
            }
        }
    }
    let mut out: Vec<RegionCount> = counts
        .into_iter()
        .map(|(region, rows)| RegionCount { region, rows })
        .collect();
    out.sort_by(|a, b| {
        b.rows
            .cmp(&a.rows)
            .then_with(|| a.region.as_str().cmp(b.region.as_str()))
    });
    out
}
