//! Hebrew names for calendar months and Hebrew-calendar dates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Gregorian month names as printed on the calendar pages.
const GREGORIAN_MONTH_NAMES: [&str; 12] = [
    "ינואר",
    "פברואר",
    "מרץ",
    "אפריל",
    "מאי",
    "יוני",
    "יולי",
    "אוגוסט",
    "ספטמבר",
    "אוקטובר",
    "נובמבר",
    "דצמבר",
];

/// Hebrew months from Tishrei, without the leap month.
const HEBREW_MONTH_NAMES: [&str; 12] = [
    "תשרי", "חשון", "כסלו", "טבת", "שבט", "אדר", "ניסן", "אייר", "סיון", "תמוז", "אב", "אלול",
];

/// Difference between the Hebrew year and the Gregorian year before Tishrei.
const HEBREW_YEAR_OFFSET: i32 = 3760;

/// A Gregorian day expressed in the Hebrew calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HebrewDate {
    /// Full date in Hebrew script, e.g. `ח׳ באלול תשפ״ה`
    pub hebrew: String,
    pub gregorian: NaiveDate,
    pub day: u32,
    /// 1 = Tishrei .. 12 = Elul, 13 = Adar II
    pub month: u32,
    pub year: i32,
    pub month_name: String,
    /// Year in Hebrew numerals, e.g. `תשפ״ה`
    pub year_traditional: String,
}

impl HebrewDate {
    /// `אלול תשפ״ה` style heading.
    pub fn month_label(&self) -> String {
        format!("{} {}", self.month_name, self.year_traditional)
    }
}

pub fn gregorian_month_name(month: u32) -> Option<&'static str> {
    GREGORIAN_MONTH_NAMES.get(month.checked_sub(1)? as usize).copied()
}

/// Month number for a Hebcal transliterated month name; unknown names map to
/// Tishrei.
pub fn hebrew_month_number(name: &str) -> u32 {
    match name {
        "Tishrei" => 1,
        "Cheshvan" => 2,
        "Kislev" => 3,
        "Tevet" => 4,
        "Shevat" => 5,
        "Adar" | "Adar I" => 6,
        "Nisan" => 7,
        "Iyyar" => 8,
        "Sivan" => 9,
        "Tamuz" => 10,
        "Av" => 11,
        "Elul" => 12,
        "Adar II" => 13,
        _ => 1,
    }
}

/// Writes `n` (mod 1000) in Hebrew numerals with geresh or gershayim.
pub fn hebrew_numeral(n: u32) -> String {
    const HUNDREDS: [(u32, char); 4] = [(400, 'ת'), (300, 'ש'), (200, 'ר'), (100, 'ק')];
    const TENS: [char; 9] = ['י', 'כ', 'ל', 'מ', 'נ', 'ס', 'ע', 'פ', 'צ'];
    const ONES: [char; 9] = ['א', 'ב', 'ג', 'ד', 'ה', 'ו', 'ז', 'ח', 'ט'];

    let mut n = n % 1000;
    let mut letters = Vec::new();

    for (value, letter) in HUNDREDS {
        while n >= value {
            letters.push(letter);
            n -= value;
        }
    }

    // 15 and 16 avoid spelling the divine name
    match n {
        15 => letters.extend(['ט', 'ו']),
        16 => letters.extend(['ט', 'ז']),
        _ => {
            if n >= 10 {
                letters.push(TENS[(n / 10 - 1) as usize]);
            }
            if n % 10 > 0 {
                letters.push(ONES[(n % 10 - 1) as usize]);
            }
        }
    }

    match letters.len() {
        0 => String::new(),
        1 => format!("{}׳", letters[0]),
        len => {
            let head: String = letters[..len - 1].iter().collect();
            format!("{}״{}", head, letters[len - 1])
        }
    }
}

/// Offline heading for a Gregorian month: the Hebrew month its 1st usually
/// falls in, with the Hebrew year.
///
/// Can be one month off around Rosh Hashana and in leap years.
pub fn approximate_month_label(year: i32, month: u32) -> String {
    let index = ((month + 2) % 12) as usize;
    let hebrew_year = year + HEBREW_YEAR_OFFSET + i32::from(month >= 10);
    format!(
        "{} {}",
        HEBREW_MONTH_NAMES[index],
        hebrew_numeral(hebrew_year.max(0) as u32)
    )
}
