/// Ordered category inference rules.
///
/// A rule table is a list of `(matcher, category)` pairs evaluated top to bottom;
/// the first match wins and no match resolves to `Category::Other`. Agency name
/// keywords are listed before abbreviations, and abbreviations only match whole tokens, so
/// "EPA" does not fire inside "DEPARTMENT" nor "ED" inside "FEDERAL".
use crate::model::Category;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Case-insensitive substring. The needle is stored uppercased.
    Contains(String),
    /// Case-insensitive whole token, bounded by non-alphanumeric characters or the
    /// ends of the value. The token is stored uppercased.
    Token(String),
    /// Exact, case-sensitive equality.
    Exact(String),
}

impl Matcher {
    pub fn contains(needle: &str) -> Self {
        Matcher::Contains(needle.to_uppercase())
    }

    pub fn token(token: &str) -> Self {
        Matcher::Token(token.to_uppercase())
    }

    pub fn exact(value: &str) -> Self {
        Matcher::Exact(value.to_string())
    }

    fn matches(&self, value: &str, upper: &str) -> bool {
        match self {
            Matcher::Contains(needle) => upper.contains(needle.as_str()),
            Matcher::Token(token) => upper
                .split(|c: char| !c.is_alphanumeric())
                .any(|part| part == token.as_str()),
            Matcher::Exact(expected) => value == expected.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    pub matcher: Matcher,
    pub category: Category,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRules {
    rules: Vec<CategoryRule>,
}

impl CategoryRules {
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        Self { rules }
    }

    /// Agency name or abbreviation to display category.
    ///
    /// Name keywords match anywhere, so sub-agencies such as "Office of Elementary and
    /// Secondary Education" resolve with their department.
    pub fn agency_defaults() -> Self {
        use Category::*;
        let keywords = Self::from_pairs(
            Matcher::contains,
            &[
                ("Health and Human Services", Healthcare),
                ("Education", Education),
                ("Environmental Protection", Environment),
                ("Science Foundation", Research),
                ("Defense", Defense),
                ("Agriculture", Agriculture),
                ("Small Business", SmallBusiness),
                ("Housing", SocialServices),
                ("Transportation", Infrastructure),
                ("Energy", Environment),
            ],
        );
        let abbreviations = Self::from_pairs(
            Matcher::token,
            &[
                ("HHS", Healthcare),
                ("ED", Education),
                ("EPA", Environment),
                ("NSF", Research),
                ("DOD", Defense),
                ("USDA", Agriculture),
                ("SBA", SmallBusiness),
                ("HUD", SocialServices),
                ("DOT", Infrastructure),
                ("NASA", Research),
                ("DOE", Environment),
            ],
        );
        Self::new(keywords.rules.into_iter().chain(abbreviations.rules).collect())
    }

    /// Grants.gov funding-category code to display category.
    pub fn funding_code_defaults() -> Self {
        use Category::*;
        Self::from_pairs(
            Matcher::exact,
            &[
                ("AG", Agriculture),
                ("AR", ArtsCulture),
                ("BC", SmallBusiness),
                ("CD", SocialServices),
                ("CP", SocialServices),
                ("DPR", Defense),
                ("ED", Education),
                ("ELT", SocialServices),
                ("EN", Environment),
                ("FN", SocialServices),
                ("HL", Healthcare),
                ("HO", SocialServices),
                ("HU", SocialServices),
                ("ISS", Research),
                ("IS", Infrastructure),
                ("LJL", SocialServices),
                ("NR", Environment),
                ("O", Other),
                ("RA", Research),
                ("RD", Research),
                ("ST", Research),
                ("T", Infrastructure),
            ],
        )
    }

    fn from_pairs(matcher: fn(&str) -> Matcher, pairs: &[(&str, Category)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|(needle, category)| CategoryRule {
                    matcher: matcher(needle),
                    category: *category,
                })
                .collect(),
        )
    }

    pub fn resolve(&self, value: &str) -> Category {
        let upper = value.to_uppercase();
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(value, &upper))
            .map(|rule| rule.category)
            .unwrap_or(Category::Other)
    }
}
