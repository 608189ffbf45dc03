#[macro_export]
macro_rules! pattern {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        regex::Regex::clone(&RE)
    }};
}

#[macro_export]
macro_rules! name_like {
    ($pat:literal) => {
        $crate::Matcher::Pattern($crate::pattern!($pat))
    };
}

#[macro_export]
macro_rules! rule {
    (
        name: $name:expr,
        matchers: [ $($matcher:expr),* $(,)? ]
        $(, traits: $traits:expr)?
        , instructions: [ $($instruction:expr),* $(,)? ]
        $(,)?
    ) => {{
        $crate::EnhancementRule {
            name: ::std::string::String::from($name),
            matchers: vec![ $($matcher),* ],
            instructions: vec![ $($instruction),* ],
            traits: { 0 $(| $traits)? },
        }
    }};
}
