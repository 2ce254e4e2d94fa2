pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS food_data (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  energy REAL NOT NULL,
  protein REAL NOT NULL,
  fats REAL NOT NULL,
  carbohydrates REAL NOT NULL,
  fiber REAL NOT NULL,
  sugars REAL NOT NULL,
  sodium_na REAL NOT NULL,
  health_score INTEGER NOT NULL
);
"#;
