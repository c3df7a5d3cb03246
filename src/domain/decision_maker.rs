pub const ROLE_KEYWORDS: [&str; 16] = [
    "Chief Executive Officer",
    "CEO",
    "Founder",
    "Co-Founder",
    "Owner",
    "Managing Director",
    "General Manager",
    "Director",
    "Manager",
    "Partner",
    "المدير التنفيذي",
    "الرئيس التنفيذي",
    "مؤسس",
    "المدير العام",
    "مدير",
    "مالك",
];

// "Ahmed Hassan - CEO - Smile Clinic | LinkedIn" -> "Ahmed Hassan"
pub fn extract_person_name(title: &str) -> Option<String> {
    let separators = [
        "'s Post -",
        "posted on",
        " on LinkedIn",
        " en LinkedIn",
        " auf LinkedIn",
        " sur LinkedIn",
        " - ",
        " – ",
        " — ",
        "|",
        ",",
    ];

    let name = separators
        .iter()
        .filter_map(|sep| title.split_once(sep).map(|parts| parts.0))
        .min_by_key(|head| head.len())
        .unwrap_or(title);

    let name = name
        .trim()
        .trim_start_matches("Dr.")
        .trim_start_matches("Dr ")
        .trim();

    let words = name.split_whitespace().count();
    let looks_like_name = (1..=5).contains(&words)
        && !name.to_lowercase().contains("linkedin")
        && !name.chars().any(|c| c.is_ascii_digit());

    match looks_like_name {
        true => Some(name.to_string()),
        false => None,
    }
}

pub fn extract_role(text: &str) -> Option<String> {
    let lowered = text.to_lowercase();
    ROLE_KEYWORDS
        .iter()
        .find(|role| lowered.contains(&role.to_lowercase()))
        .map(|role| role.to_string())
}

pub fn build_profile_search_query(company_name: &str) -> String {
    format!(
        r#"site:linkedin.com/in "{}" (CEO OR Founder OR Owner OR Manager OR Director OR مدير)"#,
        company_name
    )
}
