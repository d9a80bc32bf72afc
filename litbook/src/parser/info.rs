/// A fence info string split into its parts: `scala:book title="x"` has
/// language `scala`, annotation `book` and attributes `title="x"`.
#[derive(Debug, Clone, PartialEq)]
pub struct FenceInfo<'a> {
    pub language: &'a str,
    pub annotation: Option<&'a str>,
    pub attributes: &'a str,
}

pub fn parse_info(info: &str) -> FenceInfo<'_> {
    let info = info.trim();
    let (word, attributes) = match info.find(char::is_whitespace) {
        Some(pos) => (&info[..pos], info[pos..].trim_start()),
        None => (info, ""),
    };
    let (language, annotation) = match word.split_once(':') {
        Some((language, annotation)) => (language, Some(annotation)),
        None => (word, None),
    };
    FenceInfo {
        language,
        annotation,
        attributes,
    }
}
