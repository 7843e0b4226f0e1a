//! Natural ("Finder-like") name ordering.

use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

/// Compares two names the way a file browser sorts them.
///
/// Letters compare case-insensitively and runs of digits compare by numeric
/// value, so `app2.ipa` sorts before `app10.ipa`. Names that only differ in
/// case or leading zeros fall back to a plain byte comparison, keeping the
/// order total and deterministic.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        let (l, r) = match (left.peek(), right.peek()) {
            (None, None) => break,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(&l), Some(&r)) => (l, r),
        };

        let ord = if l.is_ascii_digit() && r.is_ascii_digit() {
            let l_run = take_digits(&mut left);
            let r_run = take_digits(&mut right);
            cmp_digit_runs(&l_run, &r_run)
        } else {
            left.next();
            right.next();
            l.to_lowercase().cmp(r.to_lowercase())
        };

        if ord != Ordering::Equal {
            return ord;
        }
    }

    a.cmp(b)
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        run.push(c);
    }
    run
}

fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
