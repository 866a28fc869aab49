//! Closed code lists shared by users, posts and admin requests.
//!
//! Every enum here is stored as its wire code in a `text` column (or as an
//! element of a `text[]` column) and travels over JSON as the same code.

use diesel::{
    deserialize::{self, FromSql},
    pg::{Pg, PgValue},
    serialize::{self, IsNull, Output, ToSql},
    sql_types::Text,
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, io::Write, str::FromStr};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} code `{code}`")]
pub struct UnknownCode {
    pub kind: &'static str,
    pub code: String,
}

pub trait Code: Copy + Ord + FromStr<Err = UnknownCode> + 'static {
    const ALL: &'static [Self];

    fn code(self) -> &'static str;
}

macro_rules! code_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $code:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Serialize,
            Deserialize,
            diesel::AsExpression,
            diesel::FromSqlRow,
        )]
        #[diesel(sql_type = diesel::sql_types::Text)]
        pub enum $name {
            $(
                #[serde(rename = $code)]
                $variant,
            )+
        }

        impl Code for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn code(self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownCode;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($code => Ok($name::$variant),)+
                    _ => Err(UnknownCode {
                        kind: stringify!($name),
                        code: s.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.code())
            }
        }

        impl ToSql<Text, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                out.write_all(self.code().as_bytes())?;
                Ok(IsNull::No)
            }
        }

        impl FromSql<Text, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let raw = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
                Ok(raw.parse()?)
            }
        }
    };
}

code_enum! {
    /// Area of work. A user's interest and a post's recruitment fields share
    /// this list, so the two can be compared directly.
    pub enum Field {
        Pm => "PM",
        Design => "DESIGN",
        Frontend => "FRONTEND",
        Backend => "BACKEND",
        AiMl => "AI_ML",
        Embedded => "EMBEDDED",
        Qa => "QA",
        Network => "NETWORK",
        Etc => "ETC",
    }
}

code_enum! {
    pub enum Affiliation {
        StudentCs => "STUDENT_CS",
        StudentNonCs => "STUDENT_NON_CS",
        Graduate => "GRADUATE",
        Worker => "WORKER",
        NonMajor => "NON_MAJOR",
    }
}

code_enum! {
    /// Who may apply to a post. Besides one code per affiliation there is an
    /// umbrella `STUDENT` code and `ANYONE`.
    pub enum Eligibility {
        Student => "STUDENT",
        StudentCs => "STUDENT_CS",
        StudentNonCs => "STUDENT_NON_CS",
        Graduate => "GRADUATE",
        Worker => "WORKER",
        NonMajor => "NON_MAJOR",
        Anyone => "ANYONE",
    }
}

code_enum! {
    pub enum DevLevel {
        Novice => "NOVICE",
        Intermediate => "INTERMEDIATE",
        Advanced => "ADVANCED",
    }
}

code_enum! {
    pub enum Month {
        Jan => "1월",
        Feb => "2월",
        Mar => "3월",
        Apr => "4월",
        May => "5월",
        Jun => "6월",
        Jul => "7월",
        Aug => "8월",
        Sep => "9월",
        Oct => "10월",
        Nov => "11월",
        Dec => "12월",
    }
}

code_enum! {
    pub enum Quarter {
        Q1 => "1분기",
        Q2 => "2분기",
        Q3 => "3분기",
        Q4 => "4분기",
    }
}

code_enum! {
    pub enum ActivityType {
        Club => "CLUB",
        External => "EXTERNAL",
        Bootcamp => "BOOTCAMP",
    }
}

code_enum! {
    pub enum RequestType {
        Create => "CREATE",
        Update => "UPDATE",
    }
}

code_enum! {
    pub enum RequestStatus {
        Processing => "processing",
        Done => "done",
        Rejected => "rejected",
    }
}

// Profile defaults for new accounts.
impl Default for Field {
    fn default() -> Self {
        Field::Frontend
    }
}

impl Default for Affiliation {
    fn default() -> Self {
        Affiliation::StudentCs
    }
}

impl Default for DevLevel {
    fn default() -> Self {
        DevLevel::Novice
    }
}

impl Default for ActivityType {
    fn default() -> Self {
        ActivityType::Club
    }
}

impl Month {
    /// `number` is 1-based, as returned by `chrono::Datelike::month`.
    pub fn from_number(number: u32) -> Option<Month> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        Month::ALL.get(index).copied()
    }
}

impl Quarter {
    pub fn months(self) -> [Month; 3] {
        let start = match self {
            Quarter::Q1 => 0,
            Quarter::Q2 => 3,
            Quarter::Q3 => 6,
            Quarter::Q4 => 9,
        };
        [Month::ALL[start], Month::ALL[start + 1], Month::ALL[start + 2]]
    }
}

impl Affiliation {
    /// Eligibility codes a person with this affiliation satisfies.
    pub fn eligibility(self) -> CodeSet<Eligibility> {
        let own = match self {
            Affiliation::StudentCs => Eligibility::StudentCs,
            Affiliation::StudentNonCs => Eligibility::StudentNonCs,
            Affiliation::Graduate => Eligibility::Graduate,
            Affiliation::Worker => Eligibility::Worker,
            Affiliation::NonMajor => Eligibility::NonMajor,
        };
        let mut set: CodeSet<Eligibility> = [own, Eligibility::Anyone].into_iter().collect();
        if matches!(self, Affiliation::StudentCs | Affiliation::StudentNonCs) {
            set.insert(Eligibility::Student);
        }
        set
    }
}

/// Ordered, duplicate-free set of codes. Iterates in declaration order of `T`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    transparent,
    bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de> + Ord")
)]
pub struct CodeSet<T>(BTreeSet<T>);

impl<T: Code> CodeSet<T> {
    pub fn new() -> Self {
        CodeSet(BTreeSet::new())
    }

    /// Parses a comma-packed list such as `BACKEND,FRONTEND`. Unknown codes
    /// and the `ALL` sentinel are dropped, so the result may be empty.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty() && *code != "ALL")
            .filter_map(|code| code.parse().ok())
            .collect()
    }

    pub fn contains(&self, code: T) -> bool {
        self.0.contains(&code)
    }

    pub fn intersects(&self, other: &CodeSet<T>) -> bool {
        self.0.iter().any(|code| other.0.contains(code))
    }

    pub fn insert(&mut self, code: T) -> bool {
        self.0.insert(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }
}

impl<T: Code> Default for CodeSet<T> {
    fn default() -> Self {
        CodeSet::new()
    }
}

impl<T: Code> FromIterator<T> for CodeSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        CodeSet(iter.into_iter().collect())
    }
}

impl<T: Code> From<Vec<T>> for CodeSet<T> {
    fn from(codes: Vec<T>) -> Self {
        codes.into_iter().collect()
    }
}

impl<T: Code> From<CodeSet<T>> for Vec<T> {
    fn from(set: CodeSet<T>) -> Self {
        set.0.into_iter().collect()
    }
}

impl<T: Code> fmt::Display for CodeSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.iter().map(Code::code).join(","))
    }
}
