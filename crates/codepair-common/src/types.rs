use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Javascript,
    Python,
    Html,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Javascript, Language::Python, Language::Html];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Javascript => "javascript",
            Language::Python => "python",
            Language::Html => "html",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Javascript => "JavaScript",
            Language::Python => "Python",
            Language::Html => "HTML/CSS",
        }
    }

    /// Starter document for a freshly created session.
    pub fn default_code(&self) -> &'static str {
        match self {
            Language::Javascript => {
                "// Write your JavaScript code here\n\n\
                 function fibonacci(n) {\n  if (n <= 1) return n;\n  return fibonacci(n - 1) + fibonacci(n - 2);\n}\n\n\
                 for (let i = 0; i < 10; i++) {\n  console.log(`F(${i}) = ${fibonacci(i)}`);\n}\n"
            }
            Language::Python => {
                "# Write your Python code here\n\n\
                 def fibonacci(n):\n    if n <= 1:\n        return n\n    return fibonacci(n - 1) + fibonacci(n - 2)\n\n\
                 for i in range(10):\n    print(f'F({i}) = {fibonacci(i)}')\n"
            }
            Language::Html => {
                "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n  <meta charset=\"UTF-8\">\n  <title>Preview</title>\n</head>\n\
                 <body>\n  <h1>Hello!</h1>\n  <p>Edit this HTML/CSS code to see live changes</p>\n</body>\n</html>\n"
            }
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "javascript" => Ok(Language::Javascript),
            "python" => Ok(Language::Python),
            "html" => Ok(Language::Html),
            other => Err(format!("unsupported language: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Interviewer,
    #[default]
    Candidate,
}

/// Identity a user presents when creating or joining a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub color: String,
    pub joined_at: i64,
    pub is_online: bool,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Authoritative session record as held by a session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub expires_at: i64,
    pub code: String,
    pub language: Language,
    pub participants: Vec<Participant>,
    pub creator_id: String,
}

impl Session {
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at < now_ms
    }

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn online_count(&self) -> usize {
        self.participants.iter().filter(|p| p.is_online).count()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const AVATAR_COLORS: [&str; 6] = [
    "hsl(250, 84%, 54%)",
    "hsl(280, 70%, 60%)",
    "hsl(340, 82%, 52%)",
    "hsl(142, 71%, 45%)",
    "hsl(45, 93%, 47%)",
    "hsl(200, 84%, 54%)",
];

const NAME_ADJECTIVES: [&str; 6] = ["Quick", "Clever", "Bright", "Swift", "Smart", "Sharp"];
const NAME_NOUNS: [&str; 6] = [
    "Coder",
    "Developer",
    "Programmer",
    "Engineer",
    "Hacker",
    "Builder",
];

/// Pick an avatar color from the fixed palette.
pub fn random_color() -> String {
    let mut rng = rand::thread_rng();
    AVATAR_COLORS
        .choose(&mut rng)
        .copied()
        .unwrap_or(AVATAR_COLORS[0])
        .to_string()
}

/// Generate a display name like "Swift Coder" for users who skip naming.
pub fn anonymous_name() -> String {
    let mut rng = rand::thread_rng();
    let adj = NAME_ADJECTIVES.choose(&mut rng).copied().unwrap_or("Quick");
    let noun = NAME_NOUNS.choose(&mut rng).copied().unwrap_or("Coder");
    format!("{adj} {noun}")
}
