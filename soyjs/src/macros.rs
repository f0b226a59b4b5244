// `ok!` and `some!` are less bloaty alternatives to the standard library's try operator (`?`).
// The crate never needs error conversions internally so a plain match is all it takes.

macro_rules! ok {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(err) => return Err(err),
        }
    };
}

macro_rules! some {
    ($expr:expr) => {
        match $expr {
            Some(val) => val,
            None => return None,
        }
    };
}
