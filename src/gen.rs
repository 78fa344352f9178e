use crate::role::md5_password;
use rand::Rng;

/// Generate a random password with the given length
pub fn gen_password(length: u8) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\
                            abcdefghijklmnopqrstuvwxyz\
                            0123456789)(*&^%$#@!~";

    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Print a password, generated unless given, and its md5 stored form when a
/// username is given.
pub fn gen_pass(length: u8, username: Option<&str>, password: Option<&str>) {
    let password = match password {
        Some(password) => password.to_string(),
        None => {
            let password = gen_password(length);
            println!("Generated password: {}", password);
            password
        }
    };

    if let Some(username) = username {
        println!(
            "Encrypted password for {}: {}",
            username,
            md5_password(username, &password)
        );
    }
}
