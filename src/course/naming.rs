/// Expand a shortname template.
///
/// `%f` is replaced by the fullname and `%i` by the idnumber. A placeholder
/// may carry a case modifier (`+` upper, `-` lower, `~` title) and a maximum
/// length, e.g. `%+3f`. A `%` directly preceded by another `%` is literal.
pub fn generate_shortname(template: &str, fullname: &str, idnumber: &str) -> Option<String> {
    if template.is_empty() {
        return None;
    }
    if !template.contains('%') {
        return Some(template.to_string());
    }

    let chars: Vec<char> = template.chars().collect();
    let mut result = String::with_capacity(template.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '%' && (i == 0 || chars[i - 1] != '%') {
            if let Some((value, consumed)) = expand_placeholder(&chars[i + 1..], fullname, idnumber) {
                result.push_str(&value);
                i += 1 + consumed;
                continue;
            }
        }
        result.push(chars[i]);
        i += 1;
    }

    let result = result.trim();
    if result.is_empty() {
        None
    } else {
        Some(result.to_string())
    }
}

fn expand_placeholder(rest: &[char], fullname: &str, idnumber: &str) -> Option<(String, usize)> {
    let mut pos = 0;
    let modifier = match rest.first() {
        Some(c @ ('+' | '-' | '~')) => {
            pos += 1;
            Some(*c)
        }
        _ => None,
    };

    let digits_start = pos;
    while pos < rest.len() && rest[pos].is_ascii_digit() {
        pos += 1;
    }
    let length: Option<usize> = rest[digits_start..pos]
        .iter()
        .collect::<String>()
        .parse()
        .ok();

    let source = match rest.get(pos) {
        Some('f') => fullname,
        Some('i') => idnumber,
        _ => return None,
    };
    pos += 1;

    let mut value = match modifier {
        Some('+') => source.to_uppercase(),
        Some('-') => source.to_lowercase(),
        Some('~') => title_case(source),
        _ => source.to_string(),
    };
    if let Some(length) = length.filter(|l| *l > 0) {
        value = value.chars().take(length).collect();
    }

    Some((value, pos))
}

fn title_case(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut word_start = true;
    for c in value.chars() {
        if c.is_whitespace() {
            word_start = true;
            result.push(c);
        } else if word_start {
            result.extend(c.to_uppercase());
            word_start = false;
        } else {
            result.extend(c.to_lowercase());
        }
    }
    result
}

/// Next candidate in the `name`, `name_2`, ... / `name9`, `name10` sequence.
fn increment(value: &str) -> String {
    let digit_count = value
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if digit_count == 0 {
        return format!("{}_2", value);
    }

    let (stem, digits) = value.split_at(value.len() - digit_count);
    match digits.parse::<u64>().ok().and_then(|n| n.checked_add(1)) {
        Some(next) => format!("{}{}", stem, next),
        None => format!("{}_2", value),
    }
}

/// Increment `shortname` at least once, then until `exists` reports it free.
pub fn increment_shortname<E, F>(shortname: &str, mut exists: F) -> Result<String, E>
where
    F: FnMut(&str) -> Result<bool, E>,
{
    let mut candidate = shortname.to_string();
    loop {
        candidate = increment(&candidate);
        if !exists(&candidate)? {
            return Ok(candidate);
        }
    }
}

/// Increment `idnumber` only while `exists` reports it in use.
pub fn increment_idnumber<E, F>(idnumber: &str, mut exists: F) -> Result<String, E>
where
    F: FnMut(&str) -> Result<bool, E>,
{
    let mut candidate = idnumber.to_string();
    while exists(&candidate)? {
        candidate = increment(&candidate);
    }
    Ok(candidate)
}
