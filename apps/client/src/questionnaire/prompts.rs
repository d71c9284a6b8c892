use serde::{Deserialize, Serialize};

/// Fixed master list of questions, asked in order.
/// The exact text (trailing space included) is the key the backend sees.
pub const STATIC_PROMPTS: &[&str] = &[
    "Enter your name: ",
    "Enter your address: ",
    "Enter your hometown: ",
    "Where did you complete your 10th grade? ",
    "How many subjects in 10th grade? ",
    "Subjects in 10th grade (comma-separated): ",
    "Total score in 10th grade: ",
    "Where did you complete your 12th grade? ",
    "How many subjects in 12th grade? ",
    "Subjects in 12th grade (comma-separated): ",
    "Total score in 12th grade: ",
    "Where are you pursuing your Bachelor's? ",
    "What's your Bachelor's specialization? ",
    BACHELOR_COMPLETED,
    "What is your current semester? ",
    "What is your current CGPA? ",
    "Tech stacks you're comfortable with (comma-separated): ",
    "Enter your Skills (comma-separated): ",
    PROJECT_COUNT,
    CERTIFICATE_COUNT,
];

pub const BACHELOR_COMPLETED: &str = "Completed your Bachelor's? (yes/no): ";
pub const PROJECT_COUNT: &str = "How many projects do you want to add? ";
pub const CERTIFICATE_COUNT: &str = "How many certificates do you want to add? ";

/// Selectable completion years for certificates, inclusive.
pub const YEAR_RANGE: std::ops::RangeInclusive<u16> = 2010..=2025;

/// Largest count a project or certificate answer may give.
pub const MAX_EXPANDED_ENTRIES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubPromptKind {
    ProjectName,
    ProjectDescription,
    CertificateName,
    CertificateOrg,
    CertificateYear,
}

/// How the answer to a prompt must be supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    FreeText,
    YesNo,
    Year,
}

/// What a count prompt expands into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    Projects,
    Certificates,
}

impl Expansion {
    fn sub_kinds(self) -> &'static [SubPromptKind] {
        match self {
            Expansion::Projects => &[SubPromptKind::ProjectName, SubPromptKind::ProjectDescription],
            Expansion::Certificates => &[
                SubPromptKind::CertificateName,
                SubPromptKind::CertificateOrg,
                SubPromptKind::CertificateYear,
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Static { index: usize, text: &'static str },
    Dynamic { index: usize, kind: SubPromptKind },
}

impl Prompt {
    /// The entry at `index` of the master list.
    #[cfg(test)]
    pub fn master(index: usize) -> Option<Prompt> {
        STATIC_PROMPTS
            .get(index)
            .map(|&text| Prompt::Static { index, text })
    }

    pub fn text(&self) -> String {
        match self {
            Prompt::Static { text, .. } => text.to_string(),
            Prompt::Dynamic { index, kind } => match kind {
                SubPromptKind::ProjectName => format!("Enter name of project {index}: "),
                SubPromptKind::ProjectDescription => {
                    format!("Enter description for project {index}: ")
                }
                SubPromptKind::CertificateName => format!("Enter name of certificate {index}: "),
                SubPromptKind::CertificateOrg => {
                    format!("Enter issuing organization for certificate {index}: ")
                }
                SubPromptKind::CertificateYear => {
                    format!("Enter year of completion for certificate {index}: ")
                }
            },
        }
    }

    pub fn input_kind(&self) -> InputKind {
        match self {
            Prompt::Static { text, .. } if *text == BACHELOR_COMPLETED => InputKind::YesNo,
            Prompt::Dynamic {
                kind: SubPromptKind::CertificateYear,
                ..
            } => InputKind::Year,
            _ => InputKind::FreeText,
        }
    }

    /// The expansion this prompt triggers once answered, if it is a count prompt.
    pub fn expansion(&self) -> Option<Expansion> {
        match self {
            Prompt::Static { text, .. } => match *text {
                PROJECT_COUNT => Some(Expansion::Projects),
                CERTIFICATE_COUNT => Some(Expansion::Certificates),
                _ => None,
            },
            Prompt::Dynamic { .. } => None,
        }
    }
}

/// Generates the sub-prompts for `count` entries, entry by entry (1-based).
pub fn expand(count: usize, expansion: Expansion) -> Vec<Prompt> {
    (1..=count)
        .flat_map(|index| {
            expansion
                .sub_kinds()
                .iter()
                .map(move |&kind| Prompt::Dynamic { index, kind })
        })
        .collect()
}

/// Reads a leading integer the way a lenient form field would:
/// optional whitespace and sign, then digits. Garbage and negatives are 0.
pub fn parse_count(raw: &str) -> usize {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let digits = &digits[..end];
    if negative || digits.is_empty() {
        return 0;
    }
    // Overflow saturates; the expansion cap applies anyway.
    digits.parse::<usize>().unwrap_or(usize::MAX)
}
