//! Static rule tables that turn detected keywords into suggestions and
//! follow-up questions. All functions are pure.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::RegexSet;
use strum::{AsRefStr, EnumIter, IntoEnumIterator};

use crate::types::{ChatMessage, SkillLevel, SuggestionSet};

/// Topics recognised in user and assistant text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    Python,
    JavaScript,
    TypeScript,
    Rust,
    Go,
    Java,
    React,
    Vue,
    Django,
    Flask,
    FastApi,
    Express,
    Api,
    Database,
    Authentication,
    Testing,
    Docker,
    Deployment,
    Async,
}

impl Keyword {
    /// Word-bounded pattern matched against lowercased text.
    fn pattern(self) -> &'static str {
        match self {
            Keyword::Python => r"\b(?:python\d?|django|flask|fastapi|pip)\b",
            Keyword::JavaScript => r"\b(?:javascript|node\.?js|npm|js)\b",
            Keyword::TypeScript => r"\b(?:typescript|tsx?)\b",
            Keyword::Rust => r"\b(?:rust|cargo|rustc)\b",
            Keyword::Go => r"\b(?:golang|go)\b",
            Keyword::Java => r"\b(?:java|spring boot)\b",
            Keyword::React => r"\breact(?:js)?\b",
            Keyword::Vue => r"\bvue(?:js)?\b",
            Keyword::Django => r"\bdjango\b",
            Keyword::Flask => r"\bflask\b",
            Keyword::FastApi => r"\bfastapi\b",
            Keyword::Express => r"\bexpress(?:js)?\b",
            Keyword::Api => r"\b(?:apis?|endpoints?|rest(?:ful)?\s+apis?|restful)\b",
            Keyword::Database => {
                r"\b(?:databases?|sql|mysql|nosql|sqlite|postgres(?:ql)?|mongodb)\b"
            }
            Keyword::Authentication => {
                r"\b(?:auth|oauth2?|authenticat\w*|authoriz\w*|log[ -]?in|jwt|passwords?)\b"
            }
            Keyword::Testing => r"\b(?:tests?|testing|unittest|pytest|jest)\b",
            Keyword::Docker => r"\b(?:docker\w*|containers?)\b",
            Keyword::Deployment => r"\b(?:deploy\w*|ci/cd|production)\b",
            Keyword::Async => r"\b(?:async\w*|await)\b",
        }
    }

    fn suggestion(self) -> &'static str {
        match self {
            Keyword::Python => "Use virtual environments and pin your dependencies",
            Keyword::JavaScript => "Prefer const and let over var in modern JavaScript",
            Keyword::TypeScript => "Enable strict mode in tsconfig.json",
            Keyword::Rust => "Run cargo clippy to catch common mistakes",
            Keyword::Go => "Run go vet and gofmt before committing",
            Keyword::Java => "Keep classes small and favour composition over inheritance",
            Keyword::React => "Split large components into smaller reusable ones",
            Keyword::Vue => "Use the Composition API for shared logic",
            Keyword::Django => "Keep business logic out of views",
            Keyword::Flask => "Organise larger Flask apps with blueprints",
            Keyword::FastApi => "Declare request and response models with Pydantic",
            Keyword::Express => "Centralise error handling in an Express middleware",
            Keyword::Api => "Document your API with an OpenAPI specification",
            Keyword::Database => "Create indexes for frequently queried fields",
            Keyword::Authentication => "Never store plain-text passwords; hash them with bcrypt",
            Keyword::Testing => "Automate your tests in a CI pipeline",
            Keyword::Docker => "Use multi-stage builds to keep images small",
            Keyword::Deployment => "Keep secrets in environment variables, not in code",
            Keyword::Async => "Don't forget to handle async errors properly",
        }
    }
}

static KEYWORD_PATTERNS: LazyLock<(Vec<Keyword>, RegexSet)> = LazyLock::new(|| {
    let keywords: Vec<Keyword> = Keyword::iter().collect();
    let set = RegexSet::new(keywords.iter().map(|k| k.pattern()))
        .expect("keyword patterns are valid");
    (keywords, set)
});

/// Finds every [`Keyword`] mentioned in `text` (case-insensitive). Only whole
/// words count, so "trust" is not Rust and "latest" is not Testing.
pub fn detect_keywords(text: &str) -> BTreeSet<Keyword> {
    let (keywords, set) = &*KEYWORD_PATTERNS;
    set.matches(&text.to_lowercase())
        .into_iter()
        .map(|i| keywords[i])
        .collect()
}

fn skill_tip(skill_level: SkillLevel) -> &'static str {
    match skill_level {
        SkillLevel::Beginner => "Start with small programs and build up complexity gradually",
        SkillLevel::Intermediate => "Learn common design patterns and when to apply them",
        SkillLevel::Advanced => "Profile before optimising and measure the impact of changes",
    }
}

/// Suggestions for one turn.
///
/// Always contains at least the skill-level tip. Order is: code tips, keyword
/// tips in keyword order, skill tip; duplicates are dropped.
pub fn suggestions(
    keywords: &BTreeSet<Keyword>,
    skill_level: SkillLevel,
    has_code: bool,
) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |s: &str| {
        if !out.iter().any(|existing| existing == s) {
            out.push(s.to_owned());
        }
    };
    if has_code {
        push("Consider adding error handling to your code");
        push("You might want to add logging for debugging");
    }
    for keyword in keywords {
        if *keyword == Keyword::Async && !has_code {
            continue;
        }
        push(keyword.suggestion());
    }
    push(skill_tip(skill_level));
    out
}

const FOLLOW_UPS: &[(&str, &str)] = &[
    (
        r"\b(?:web|apps?|application)\b",
        "Are you building a web application or mobile app?",
    ),
    (
        r"\b(?:databases?|sql)\b",
        "Which database are you planning to use?",
    ),
    (r"\bapis?\b", "Do you need authentication for your API?"),
    (
        r"\b(?:auth|log[ -]?in|passwords?)\b",
        "Should users sign in with a password or an external provider?",
    ),
    (
        r"\b(?:deploy\w*|production)\b",
        "Where do you plan to deploy it?",
    ),
    (
        r"\b(?:errors?|bugs?|exceptions?)\b",
        "Can you share the full error message and stack trace?",
    ),
];

static FOLLOW_UP_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(FOLLOW_UPS.iter().map(|(pattern, _)| *pattern))
        .expect("follow-up patterns are valid")
});

/// Clarifying questions suggested by the user's message.
pub fn follow_up_questions(message: &str) -> Vec<String> {
    FOLLOW_UP_PATTERNS
        .matches(&message.to_lowercase())
        .into_iter()
        .map(|i| FOLLOW_UPS[i].1.to_owned())
        .collect()
}

fn best_practices(skill_level: SkillLevel) -> [&'static str; 3] {
    match skill_level {
        SkillLevel::Beginner => [
            "Always use version control (Git)",
            "Write comments to explain your code",
            "Start with simple projects and gradually increase complexity",
        ],
        SkillLevel::Intermediate => [
            "Focus on clean code principles",
            "Implement proper error handling",
            "Learn about design patterns",
        ],
        SkillLevel::Advanced => [
            "Optimize for performance and scalability",
            "Implement comprehensive testing",
            "Consider microservices architecture",
        ],
    }
}

/// Personalised suggestions from a user's stored conversation.
pub fn topic_suggestions(history: &[ChatMessage], skill_level: SkillLevel) -> SuggestionSet {
    let topics: BTreeSet<Keyword> = history
        .iter()
        .flat_map(|message| detect_keywords(&message.text))
        .collect();

    let mut set = SuggestionSet::default();
    if topics.contains(&Keyword::Python) {
        set.project_ideas.push("Build a REST API with FastAPI".into());
        set.tools_and_libraries.push("Try pytest for testing".into());
        set.learning_resources.push("Python Design Patterns".into());
    }
    if topics.contains(&Keyword::JavaScript) || topics.contains(&Keyword::TypeScript) {
        set.project_ideas
            .push("Create a real-time chat app with Socket.IO".into());
        set.tools_and_libraries
            .push("Explore TypeScript for type safety".into());
        set.learning_resources
            .push("JavaScript async/await patterns".into());
    }
    if topics.contains(&Keyword::React) {
        set.project_ideas
            .push("Build a task management app with React and Redux".into());
        set.tools_and_libraries.push("Check out Next.js for SSR".into());
        set.learning_resources.push("React Hooks deep dive".into());
    }
    if topics.contains(&Keyword::Database) {
        set.best_practices
            .push("Always create indexes for frequently queried fields".into());
        set.tools_and_libraries
            .push("Use a database GUI to inspect your data".into());
    }
    set.best_practices.extend(owned(&best_practices(skill_level)));
    set
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

/// Suggestions served when no conversation store is available.
pub fn default_suggestions() -> SuggestionSet {
    SuggestionSet {
        project_ideas: owned(&[
            "Build a personal portfolio website",
            "Create a todo list application",
            "Develop a weather app with API integration",
        ]),
        learning_resources: owned(&[
            "MDN Web Docs for web development",
            "Python official documentation",
            "freeCodeCamp for hands-on learning",
        ]),
        tools_and_libraries: owned(&[
            "VS Code for code editing",
            "Postman for API testing",
            "Git for version control",
        ]),
        best_practices: owned(&[
            "Write clean, readable code",
            "Use meaningful variable names",
            "Test your code thoroughly",
        ]),
    }
}
